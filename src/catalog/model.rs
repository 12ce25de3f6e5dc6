//! Catalog model
//!
//! In-memory representation of one catalog's relational metadata: schemas,
//! tables, columns, unique keys, and foreign keys, plus the link indices
//! that make default join inference a constant-time lookup.
//!
//! Tables and foreign keys live in arenas keyed by stable integer ids, so
//! the metadata graph (tables referencing keys referencing tables) carries
//! no owning cycles. Back-indices are derived once in `ModelBuilder::finish`
//! and the finished `Model` is immutable for the life of a request.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::errors::ModelError;

/// Stable arena index of a table within a `Model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TableId(pub usize);

/// Stable arena index of a foreign key within a `Model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ForeignKeyId(pub usize);

/// Join direction of a resolved link.
///
/// `LeftToRight` means the path's current element holds the foreign key and
/// the appended element holds the referenced unique key; `RightToLeft` is
/// the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkDirection {
    LeftToRight,
    RightToLeft,
}

impl LinkDirection {
    pub fn reversed(self) -> Self {
        match self {
            LinkDirection::LeftToRight => LinkDirection::RightToLeft,
            LinkDirection::RightToLeft => LinkDirection::LeftToRight,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Column {
    pub name: String,
    /// Declared SQL type as reported by the catalog, e.g. `integer`, `text`.
    pub sql_type: String,
    pub nullable: bool,
    /// 1-based ordinal position within the table.
    pub position: usize,
}

impl Column {
    /// The virtual full-text column is spelled `*` and never stored.
    pub fn is_freetext(&self) -> bool {
        self.name == "*"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UniqueKey {
    /// Constraint name as declared in the database.
    pub name: String,
    pub columns: Vec<String>,
    pub is_primary: bool,
    /// Incoming references grouped by referencing table.
    #[serde(skip)]
    pub table_references: HashMap<TableId, Vec<ForeignKeyId>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForeignKey {
    pub name: String,
    /// Referencing table.
    pub table: TableId,
    /// Local columns, ordered to match the referenced key's columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub ref_table: TableId,
    /// Index of the referenced unique key in `ref_table`'s `uniques`.
    pub ref_key: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub id: TableId,
    pub schema: String,
    pub name: String,
    /// Columns in declared order; `column_index` maps name to offset here.
    columns: Vec<Column>,
    #[serde(skip)]
    column_index: HashMap<String, usize>,
    pub uniques: Vec<UniqueKey>,
    /// Outgoing foreign keys.
    pub fkeys: Vec<ForeignKeyId>,
    /// Outgoing references grouped by referenced table.
    #[serde(skip)]
    pub fk_references: HashMap<TableId, Vec<ForeignKeyId>>,
    /// Virtual row-level full-text search column, denoted `*`.
    #[serde(skip)]
    freetext: Column,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.column_index.get(name).map(|&i| &self.columns[i])
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Columns in declared order, for deterministic wildcard expansion.
    pub fn columns_in_order(&self) -> &[Column] {
        &self.columns
    }

    pub fn freetext_column(&self) -> &Column {
        &self.freetext
    }

    /// The key used for row addressing and sort tiebreaks: the primary key
    /// when one exists, else the first declared unique key.
    pub fn row_key(&self) -> Option<&UniqueKey> {
        self.uniques
            .iter()
            .find(|uk| uk.is_primary)
            .or_else(|| self.uniques.first())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.schema, self.name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub name: String,
    /// Tables in name order.
    pub tables: BTreeMap<String, TableId>,
}

/// A catalog's complete metadata snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Model {
    pub schemas: BTreeMap<String, Schema>,
    tables: Vec<Table>,
    fkeys: Vec<ForeignKey>,
    /// Model-version token observed at introspection time; 0 when the
    /// catalog carries no version table.
    pub version: i64,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    pub fn fkey(&self, id: ForeignKeyId) -> &ForeignKey {
        &self.fkeys[id.0]
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Resolve a possibly schema-qualified table name.
    ///
    /// With a schema the lookup is exact. Without one the name must be
    /// unambiguous across all schemas in the model.
    pub fn lookup_table(&self, schema: Option<&str>, table: &str) -> Result<TableId, ModelError> {
        match schema {
            Some(sname) => {
                let schema = self.schemas.get(sname).ok_or_else(|| ModelError::SchemaNotFound {
                    schema: sname.to_string(),
                })?;
                schema
                    .tables
                    .get(table)
                    .copied()
                    .ok_or_else(|| ModelError::TableNotFound {
                        table: format!("{}:{}", sname, table),
                    })
            }
            None => {
                let mut matches = self
                    .schemas
                    .values()
                    .filter_map(|s| s.tables.get(table))
                    .copied();
                match (matches.next(), matches.next()) {
                    (Some(id), None) => Ok(id),
                    (Some(_), Some(_)) => Err(ModelError::AmbiguousTable {
                        table: table.to_string(),
                    }),
                    (None, _) => Err(ModelError::TableNotFound {
                        table: table.to_string(),
                    }),
                }
            }
        }
    }

    /// Find the default reference link between two tables.
    ///
    /// The candidate set is the union of incoming references to `left`'s
    /// unique keys from `right` and outgoing foreign keys on `left` that
    /// target a unique key of `right`. Exactly one candidate must exist;
    /// a self-link can never be inferred.
    pub fn default_link(
        &self,
        left: TableId,
        right: TableId,
    ) -> Result<(ForeignKeyId, LinkDirection), ModelError> {
        let ltable = self.table(left);
        let rtable = self.table(right);
        if left == right {
            return Err(ModelError::SelfLink {
                table: ltable.to_string(),
            });
        }

        let mut links: Vec<(ForeignKeyId, LinkDirection)> = Vec::new();

        for uk in &ltable.uniques {
            if let Some(refs) = uk.table_references.get(&right) {
                links.extend(refs.iter().map(|&r| (r, LinkDirection::RightToLeft)));
            }
        }
        if let Some(refs) = ltable.fk_references.get(&right) {
            links.extend(refs.iter().map(|&r| (r, LinkDirection::LeftToRight)));
        }

        match links.len() {
            0 => Err(ModelError::NoLink {
                left: ltable.name.clone(),
                right: rtable.name.clone(),
            }),
            1 => Ok(links[0]),
            _ => Err(ModelError::AmbiguousLink {
                left: ltable.name.clone(),
                right: rtable.name.clone(),
            }),
        }
    }

    /// Resolve an explicitly named link column into a key reference.
    ///
    /// `column` must be an endpoint of exactly one foreign key touching
    /// `context`: either a foreign-key column on `context` (joining out to
    /// the referenced table) or, when it belongs to another table, a
    /// foreign-key or key column tying that table to `context`. Explicit
    /// links are how self-joins are expressed.
    pub fn explicit_link(
        &self,
        context: TableId,
        owner: TableId,
        column: &str,
    ) -> Result<(ForeignKeyId, LinkDirection), ModelError> {
        let mut links: Vec<(ForeignKeyId, LinkDirection)> = Vec::new();

        if owner == context {
            // Column on the context side: outgoing fkeys with this single
            // local column, or incoming references to a single-column key.
            for &fk_id in &self.table(context).fkeys {
                let fk = self.fkey(fk_id);
                if fk.columns.len() == 1 && fk.columns[0] == column {
                    links.push((fk_id, LinkDirection::LeftToRight));
                }
            }
            for uk in &self.table(context).uniques {
                if uk.columns.len() == 1 && uk.columns[0] == column {
                    for refs in uk.table_references.values() {
                        links.extend(refs.iter().map(|&r| (r, LinkDirection::RightToLeft)));
                    }
                }
            }
        } else {
            // Column on the far side: fkeys from the owner into the context,
            // or fkeys from the context into the owner's key.
            for &fk_id in &self.table(owner).fkeys {
                let fk = self.fkey(fk_id);
                if fk.ref_table == context && fk.columns.len() == 1 && fk.columns[0] == column {
                    links.push((fk_id, LinkDirection::RightToLeft));
                }
            }
            for &fk_id in &self.table(context).fkeys {
                let fk = self.fkey(fk_id);
                if fk.ref_table == owner {
                    let key = &self.table(owner).uniques[fk.ref_key];
                    if key.columns.len() == 1 && key.columns[0] == column {
                        links.push((fk_id, LinkDirection::LeftToRight));
                    }
                }
            }
        }

        match links.len() {
            0 => Err(ModelError::NotALinkColumn {
                column: column.to_string(),
            }),
            1 => Ok(links[0]),
            _ => Err(ModelError::AmbiguousLink {
                left: self.table(context).name.clone(),
                right: self.table(owner).name.clone(),
            }),
        }
    }

    /// The table a link lands on when followed in `direction` from its
    /// other end.
    pub fn link_target(&self, fk: ForeignKeyId, direction: LinkDirection) -> TableId {
        let fkey = self.fkey(fk);
        match direction {
            LinkDirection::LeftToRight => fkey.ref_table,
            LinkDirection::RightToLeft => fkey.table,
        }
    }
}

/// Column specification for `ModelBuilder`.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, sql_type: &str, nullable: bool) -> Self {
        ColumnSpec {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            nullable,
        }
    }
}

#[derive(Debug, Default)]
pub struct ModelBuilder {
    schemas: BTreeMap<String, Schema>,
    tables: Vec<Table>,
    fkeys: Vec<ForeignKey>,
    version: i64,
}

impl ModelBuilder {
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Look up an already-registered table while the model is still under
    /// construction.
    pub fn lookup(&self, schema: &str, table: &str) -> Option<TableId> {
        self.schemas
            .get(schema)
            .and_then(|s| s.tables.get(table))
            .copied()
    }

    pub fn add_table(
        &mut self,
        schema: &str,
        name: &str,
        columns: Vec<ColumnSpec>,
    ) -> Result<TableId, ModelError> {
        let id = TableId(self.tables.len());
        let schema_entry = self
            .schemas
            .entry(schema.to_string())
            .or_insert_with(|| Schema {
                name: schema.to_string(),
                tables: BTreeMap::new(),
            });
        if schema_entry.tables.contains_key(name) {
            return Err(ModelError::InvalidModel(format!(
                "duplicate table {}:{}",
                schema, name
            )));
        }
        schema_entry.tables.insert(name.to_string(), id);

        let mut cols = Vec::with_capacity(columns.len());
        let mut index = HashMap::with_capacity(columns.len());
        for (i, spec) in columns.into_iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(ModelError::InvalidModel(format!(
                    "duplicate column {} in table {}:{}",
                    spec.name, schema, name
                )));
            }
            cols.push(Column {
                name: spec.name,
                sql_type: spec.sql_type,
                nullable: spec.nullable,
                position: i + 1,
            });
        }

        self.tables.push(Table {
            id,
            schema: schema.to_string(),
            name: name.to_string(),
            columns: cols,
            column_index: index,
            uniques: Vec::new(),
            fkeys: Vec::new(),
            fk_references: HashMap::new(),
            freetext: Column {
                name: "*".to_string(),
                sql_type: "text".to_string(),
                nullable: true,
                position: 0,
            },
        });
        Ok(id)
    }

    pub fn add_unique(
        &mut self,
        table: TableId,
        name: &str,
        columns: &[&str],
        is_primary: bool,
    ) -> Result<(), ModelError> {
        let t = &self.tables[table.0];
        for col in columns {
            if !t.column_index.contains_key(*col) {
                return Err(ModelError::InvalidModel(format!(
                    "key {} references unknown column {} in table {}",
                    name, col, t
                )));
            }
        }
        self.tables[table.0].uniques.push(UniqueKey {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            is_primary,
            table_references: HashMap::new(),
        });
        Ok(())
    }

    /// Register a foreign key; the referenced unique key is matched by
    /// constraint name on the referenced table.
    pub fn add_fkey(
        &mut self,
        name: &str,
        table: TableId,
        columns: &[&str],
        ref_table: TableId,
        ref_key_name: &str,
    ) -> Result<ForeignKeyId, ModelError> {
        let t = &self.tables[table.0];
        for col in columns {
            if !t.column_index.contains_key(*col) {
                return Err(ModelError::InvalidModel(format!(
                    "foreign key {} references unknown column {} in table {}",
                    name, col, t
                )));
            }
        }
        let rk = self.tables[ref_table.0]
            .uniques
            .iter()
            .position(|uk| uk.name == ref_key_name)
            .ok_or_else(|| {
                ModelError::InvalidModel(format!(
                    "foreign key {} targets unknown key {} on table {}",
                    name, ref_key_name, self.tables[ref_table.0]
                ))
            })?;
        if self.tables[ref_table.0].uniques[rk].columns.len() != columns.len() {
            return Err(ModelError::InvalidModel(format!(
                "foreign key {} arity does not match key {}",
                name, ref_key_name
            )));
        }

        let id = ForeignKeyId(self.fkeys.len());
        self.fkeys.push(ForeignKey {
            name: name.to_string(),
            table,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ref_table,
            ref_key: rk,
        });
        Ok(id)
    }

    /// Seal the model: attach outgoing key lists and derive both back-index
    /// families from the forward foreign-key references.
    pub fn finish(mut self) -> Result<Model, ModelError> {
        for (i, fk) in self.fkeys.iter().enumerate() {
            let id = ForeignKeyId(i);
            self.tables[fk.table.0].fkeys.push(id);
            self.tables[fk.table.0]
                .fk_references
                .entry(fk.ref_table)
                .or_default()
                .push(id);
            self.tables[fk.ref_table.0].uniques[fk.ref_key]
                .table_references
                .entry(fk.table)
                .or_default()
                .push(id);
        }
        Ok(Model {
            schemas: self.schemas,
            tables: self.tables,
            fkeys: self.fkeys,
            version: self.version,
        })
    }
}
