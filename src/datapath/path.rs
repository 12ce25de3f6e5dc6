//! Entity path builder
//!
//! An `EntityPath` accumulates the elements of a URL data path in order:
//! the base entity, joined elements (inferred or explicit), filters, alias
//! bindings, context shifts, and finally sort and page keys. Assembly
//! follows the state machine
//! `empty -> based -> {filtered, linked, context-shifted}* -> frozen`;
//! attaching a projection freezes the path and only sort/page/read verbs
//! apply afterwards.

use std::collections::HashMap;

use crate::catalog::{ForeignKeyId, LinkDirection, Model, TableId};

use super::errors::PathError;
use super::filter::{BoundFilter, FilterTree};
use super::name::{Name, ResolvedBase};

#[derive(Debug, Clone)]
pub struct Link {
    pub fkey: ForeignKeyId,
    pub direction: LinkDirection,
    /// Position of the element this one joins from.
    pub source: usize,
}

#[derive(Debug, Clone)]
pub struct PathElement {
    pub pos: usize,
    pub alias: Option<String>,
    pub table: TableId,
    /// `None` only for the base element.
    pub link: Option<Link>,
    /// Filters attached while this element was the current context.
    pub filters: Vec<BoundFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub name: Name,
    pub descending: bool,
}

#[derive(Debug, Clone)]
pub struct EntityPath {
    elements: Vec<PathElement>,
    aliases: HashMap<String, usize>,
    /// `None` means the tail is current.
    context: Option<usize>,
    sort: Vec<SortKey>,
    before: Option<Vec<String>>,
    after: Option<Vec<String>>,
    frozen: bool,
}

impl EntityPath {
    /// Initialize element 0 with the base table.
    pub fn new(table: TableId, alias: Option<String>) -> Result<EntityPath, PathError> {
        let mut path = EntityPath {
            elements: vec![PathElement {
                pos: 0,
                alias: None,
                table,
                link: None,
                filters: Vec::new(),
            }],
            aliases: HashMap::new(),
            context: None,
            sort: Vec::new(),
            before: None,
            after: None,
            frozen: false,
        };
        if let Some(alias) = alias {
            path.bind_alias(alias, 0)?;
        }
        Ok(path)
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn tail_position(&self) -> usize {
        self.elements.len() - 1
    }

    pub fn tail_table(&self) -> TableId {
        self.elements[self.tail_position()].table
    }

    /// The current context position: the tail unless shifted.
    pub fn context_position(&self) -> usize {
        self.context.unwrap_or_else(|| self.tail_position())
    }

    pub fn context_table(&self) -> TableId {
        self.elements[self.context_position()].table
    }

    pub fn alias_position(&self, alias: &str) -> Option<usize> {
        self.aliases.get(alias).copied()
    }

    pub fn table_at(&self, pos: usize) -> TableId {
        self.elements[pos].table
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn before(&self) -> Option<&[String]> {
        self.before.as_deref()
    }

    pub fn after(&self) -> Option<&[String]> {
        self.after.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Freeze the element sequence; called when a projection or aggregate
    /// is attached.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn bind_alias(&mut self, alias: String, pos: usize) -> Result<(), PathError> {
        if self.aliases.contains_key(&alias) {
            return Err(PathError::DuplicateAlias { alias });
        }
        self.elements[pos].alias = Some(alias.clone());
        self.aliases.insert(alias, pos);
        Ok(())
    }

    /// Append a joined element. The join departs from the current context,
    /// or from `source_alias` when given. Appending resets the context to
    /// the new tail.
    pub fn add_link(
        &mut self,
        model: &Model,
        fkey: ForeignKeyId,
        direction: LinkDirection,
        alias: Option<String>,
        source_alias: Option<&str>,
    ) -> Result<(), PathError> {
        if self.frozen {
            return Err(PathError::Frozen);
        }
        let source = match source_alias {
            Some(a) => self
                .alias_position(a)
                .ok_or_else(|| PathError::UnboundAlias {
                    alias: a.to_string(),
                })?,
            None => self.context_position(),
        };
        let pos = self.elements.len();
        self.elements.push(PathElement {
            pos,
            alias: None,
            table: model.link_target(fkey, direction),
            link: Some(Link {
                fkey,
                direction,
                source,
            }),
            filters: Vec::new(),
        });
        if let Some(alias) = alias {
            self.bind_alias(alias, pos)?;
        }
        self.context = None;
        Ok(())
    }

    /// Attach a filter to the current context element, resolving its column
    /// references now against the path as it stands.
    pub fn add_filter(&mut self, model: &Model, tree: &FilterTree) -> Result<(), PathError> {
        if self.frozen {
            return Err(PathError::Frozen);
        }
        tree.validate()?;
        let ctx = self.context_position();
        let bound = self.bind_filter(model, tree, ctx)?;
        self.elements[ctx].filters.push(bound);
        Ok(())
    }

    fn bind_filter(
        &self,
        model: &Model,
        tree: &FilterTree,
        ctx: usize,
    ) -> Result<BoundFilter, PathError> {
        match tree {
            FilterTree::Pred { name, op, value } => {
                let (column, base) =
                    name.resolve_column(model, self, Some(self.elements[ctx].table))?;
                let pos = match base {
                    ResolvedBase::PathTail => ctx,
                    ResolvedBase::Alias(a) => {
                        self.alias_position(&a).expect("resolved alias is bound")
                    }
                    ResolvedBase::Model => {
                        return Err(PathError::ColumnNotBound {
                            column: name.to_string(),
                        })
                    }
                };
                Ok(BoundFilter::Pred {
                    column,
                    pos,
                    op: *op,
                    value: value.clone(),
                })
            }
            FilterTree::Neg(inner) => Ok(BoundFilter::Neg(Box::new(
                self.bind_filter(model, inner, ctx)?,
            ))),
            FilterTree::Conj(parts) => Ok(BoundFilter::Conj(
                parts
                    .iter()
                    .map(|p| self.bind_filter(model, p, ctx))
                    .collect::<Result<_, _>>()?,
            )),
            FilterTree::Disj(parts) => Ok(BoundFilter::Disj(
                parts
                    .iter()
                    .map(|p| self.bind_filter(model, p, ctx))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }

    /// Shift the current context to the element bound to `alias`.
    /// Subsequent filters and links are relative to it; the element
    /// sequence itself is unchanged.
    pub fn set_context(&mut self, alias: &str) -> Result<(), PathError> {
        if self.frozen {
            return Err(PathError::Frozen);
        }
        let pos = self
            .alias_position(alias)
            .ok_or_else(|| PathError::UnboundContextAlias {
                name: alias.to_string(),
            })?;
        self.context = Some(pos);
        Ok(())
    }

    /// Sort and page keys may arrive after freezing: they shape the read,
    /// not the element sequence.
    pub fn add_sort(&mut self, keys: Vec<SortKey>) {
        self.sort = keys;
    }

    pub fn set_before(&mut self, values: Vec<String>) -> Result<(), PathError> {
        self.check_page_arity("before", &values)?;
        self.before = Some(values);
        Ok(())
    }

    pub fn set_after(&mut self, values: Vec<String>) -> Result<(), PathError> {
        self.check_page_arity("after", &values)?;
        self.after = Some(values);
        Ok(())
    }

    fn check_page_arity(&self, which: &'static str, values: &[String]) -> Result<(), PathError> {
        if self.sort.is_empty() {
            return Err(PathError::PageWithoutSort);
        }
        if values.len() != self.sort.len() {
            return Err(PathError::PageArity {
                which,
                got: values.len(),
                want: self.sort.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnSpec, Model};
    use crate::datapath::filter::FilterOp;

    fn model() -> Model {
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
        b.finish().unwrap()
    }

    fn joined_path(model: &Model) -> EntityPath {
        let people = model.lookup_table(None, "people").unwrap();
        let dept = model.lookup_table(None, "dept").unwrap();
        let mut path = EntityPath::new(people, Some("P".to_string())).unwrap();
        let (fk, dir) = model.default_link(people, dept).unwrap();
        path.add_link(model, fk, dir, None, None).unwrap();
        path
    }

    #[test]
    fn test_base_and_link() {
        let model = model();
        let path = joined_path(&model);
        assert_eq!(path.len(), 2);
        assert_eq!(path.tail_table(), model.lookup_table(None, "dept").unwrap());
        assert_eq!(path.alias_position("P"), Some(0));
        assert_eq!(path.context_position(), 1);
    }

    #[test]
    fn test_context_shift_rebinds_filters() {
        let model = model();
        let mut path = joined_path(&model);
        path.set_context("P").unwrap();
        assert_eq!(path.context_position(), 0);

        let tree = FilterTree::Pred {
            name: Name::Unqualified("name".to_string()),
            op: FilterOp::Eq,
            value: Some("alice".to_string()),
        };
        path.add_filter(&model, &tree).unwrap();
        // Filter landed on the people element, not the tail.
        assert_eq!(path.elements()[0].filters.len(), 1);
        assert!(path.elements()[1].filters.is_empty());
        match &path.elements()[0].filters[0] {
            BoundFilter::Pred { column, pos, .. } => {
                assert_eq!(*pos, 0);
                assert_eq!(column.column, "name");
            }
            other => panic!("unexpected filter shape: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let model = model();
        let people = model.lookup_table(None, "people").unwrap();
        let dept = model.lookup_table(None, "dept").unwrap();
        let mut path = EntityPath::new(people, Some("A".to_string())).unwrap();
        let (fk, dir) = model.default_link(people, dept).unwrap();
        let err = path
            .add_link(&model, fk, dir, Some("A".to_string()), None)
            .unwrap_err();
        assert_eq!(
            err,
            PathError::DuplicateAlias {
                alias: "A".to_string()
            }
        );
    }

    #[test]
    fn test_unbound_context_alias() {
        let model = model();
        let mut path = joined_path(&model);
        assert_eq!(
            path.set_context("Z").unwrap_err(),
            PathError::UnboundContextAlias {
                name: "Z".to_string()
            }
        );
    }

    #[test]
    fn test_frozen_rejects_mutation() {
        let model = model();
        let mut path = joined_path(&model);
        path.freeze();
        let tree = FilterTree::Pred {
            name: Name::Unqualified("name".to_string()),
            op: FilterOp::Eq,
            value: Some("x".to_string()),
        };
        assert_eq!(path.add_filter(&model, &tree).unwrap_err(), PathError::Frozen);
        // Sort and page keys still apply to a frozen path.
        path.add_sort(vec![SortKey {
            name: Name::Unqualified("name".to_string()),
            descending: false,
        }]);
        assert!(path.set_after(vec!["alice".to_string()]).is_ok());
    }

    #[test]
    fn test_page_arity_mismatch() {
        let model = model();
        let mut path = joined_path(&model);
        path.add_sort(vec![
            SortKey {
                name: Name::Unqualified("name".to_string()),
                descending: false,
            },
            SortKey {
                name: Name::Unqualified("id".to_string()),
                descending: false,
            },
        ]);
        let err = path.set_after(vec!["alice".to_string()]).unwrap_err();
        assert_eq!(
            err,
            PathError::PageArity {
                which: "after",
                got: 1,
                want: 2
            }
        );
    }

    #[test]
    fn test_page_without_sort() {
        let model = model();
        let mut path = joined_path(&model);
        assert_eq!(
            path.set_before(vec!["x".to_string()]).unwrap_err(),
            PathError::PageWithoutSort
        );
    }

    #[test]
    fn test_filter_on_model_base_rejected() {
        let model = model();
        let people = model.lookup_table(None, "people").unwrap();
        let mut path = EntityPath::new(people, None).unwrap();
        // dept is not on the path, so a model-resolved column cannot bind.
        let tree = FilterTree::Pred {
            name: Name::Qualified("dept".to_string(), "name".to_string()),
            op: FilterOp::Eq,
            value: Some("x".to_string()),
        };
        assert!(matches!(
            path.add_filter(&model, &tree).unwrap_err(),
            PathError::ColumnNotBound { .. }
        ));
    }
}
