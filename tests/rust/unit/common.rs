//! Shared model fixtures.

use ermgate::catalog::{ColumnSpec, Model};
use ermgate::datapath::EntityPath;
use ermgate::url_parser::{parse_data_path, PathElementAst};
use ermgate::datapath::Name;

/// Two schemas: `S` holds people -> dept plus a self-referencing employee
/// table; `Sales` holds orders with two links to customer.
pub fn fixture_model() -> Model {
    let mut b = Model::builder();

    let dept = b
        .add_table(
            "S",
            "dept",
            vec![
                ColumnSpec::new("id", "integer", false),
                ColumnSpec::new("name", "text", true),
            ],
        )
        .unwrap();
    b.add_unique(dept, "dept_pkey", &["id"], true).unwrap();

    let people = b
        .add_table(
            "S",
            "people",
            vec![
                ColumnSpec::new("id", "integer", false),
                ColumnSpec::new("name", "text", true),
                ColumnSpec::new("dept_id", "integer", true),
            ],
        )
        .unwrap();
    b.add_unique(people, "people_pkey", &["id"], true).unwrap();
    b.add_fkey("people_dept_fkey", people, &["dept_id"], dept, "dept_pkey")
        .unwrap();

    let employee = b
        .add_table(
            "S",
            "employee",
            vec![
                ColumnSpec::new("id", "integer", false),
                ColumnSpec::new("manager_id", "integer", true),
            ],
        )
        .unwrap();
    b.add_unique(employee, "employee_pkey", &["id"], true).unwrap();
    b.add_fkey(
        "employee_manager_fkey",
        employee,
        &["manager_id"],
        employee,
        "employee_pkey",
    )
    .unwrap();

    let customer = b
        .add_table(
            "Sales",
            "customer",
            vec![
                ColumnSpec::new("id", "integer", false),
                ColumnSpec::new("name", "text", true),
            ],
        )
        .unwrap();
    b.add_unique(customer, "customer_pkey", &["id"], true).unwrap();

    let orders = b
        .add_table(
            "Sales",
            "orders",
            vec![
                ColumnSpec::new("id", "integer", false),
                ColumnSpec::new("buyer_id", "integer", true),
                ColumnSpec::new("payer_id", "integer", true),
            ],
        )
        .unwrap();
    b.add_unique(orders, "orders_pkey", &["id"], true).unwrap();
    b.add_fkey("orders_buyer_fkey", orders, &["buyer_id"], customer, "customer_pkey")
        .unwrap();
    b.add_fkey("orders_payer_fkey", orders, &["payer_id"], customer, "customer_pkey")
        .unwrap();

    b.finish().unwrap()
}

/// Parse a URL sub-resource and materialize it against the model, the way
/// the entity dispatcher does.
pub fn build_path(model: &Model, raw: &str) -> Result<EntityPath, ermgate::errors::RestError> {
    let ast = parse_data_path(raw)?;
    let mut elements = ast.elements.iter();
    let Some(PathElementAst::Step { name, alias }) = elements.next() else {
        panic!("fixture paths always start with a step");
    };
    let base = name.resolve_table(model)?;
    let mut path = EntityPath::new(base, alias.clone()).map_err(ermgate::errors::RestError::from)?;
    for element in elements {
        match element {
            PathElementAst::Step { name, alias } => {
                let (fkey, direction) = name.resolve_link(model, &path)?;
                path.add_link(model, fkey, direction, alias.clone(), None)
                    .map_err(ermgate::errors::RestError::from)?;
            }
            PathElementAst::Link { name, alias } => {
                let (fkey, direction, source) = name.resolve_link_column(model, &path)?;
                path.add_link(model, fkey, direction, alias.clone(), source.as_deref())
                    .map_err(ermgate::errors::RestError::from)?;
            }
            PathElementAst::Filter(tree) => {
                path.add_filter(model, tree).map_err(ermgate::errors::RestError::from)?;
            }
            PathElementAst::Context(alias) => {
                let alias = Name::Unqualified(alias.clone())
                    .resolve_context(&path)
                    .map_err(ermgate::errors::RestError::from)?;
                path.set_context(&alias).map_err(ermgate::errors::RestError::from)?;
            }
        }
    }
    if !ast.sort.is_empty() {
        path.add_sort(ast.sort.clone());
    }
    if let Some(values) = &ast.after {
        path.set_after(values.clone()).map_err(ermgate::errors::RestError::from)?;
    }
    if let Some(values) = &ast.before {
        path.set_before(values.clone()).map_err(ermgate::errors::RestError::from)?;
    }
    Ok(path)
}
