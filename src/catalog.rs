//! Catalog: the registry of tables available to the engine.
//!
//! Maps table names to ids and ids to heap files plus the table's
//! primary-key column name. The catalog holds no on-disk state of its
//! own; it is populated by callers or from a schema text file.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::heap::{HeapError, HeapFile};
use crate::storage::TableId;
use crate::tuple::{FieldType, TupleDesc};

/// Catalog errors.
#[derive(Debug)]
pub enum CatalogError {
    /// No table registered under the given name.
    NoSuchTable(String),

    /// No table registered under the given id.
    NoSuchTableId(TableId),

    /// A schema file line failed to parse.
    Schema(String),

    /// Reading the schema file failed.
    Io(std::io::Error),

    /// Opening a table's heap file failed.
    Heap(HeapError),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::NoSuchTable(name) => write!(f, "no such table: {}", name),
            CatalogError::NoSuchTableId(id) => write!(f, "no table with id {}", id),
            CatalogError::Schema(msg) => write!(f, "malformed schema line: {}", msg),
            CatalogError::Io(e) => write!(f, "io error: {}", e),
            CatalogError::Heap(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CatalogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CatalogError::Io(e) => Some(e),
            CatalogError::Heap(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e)
    }
}

impl From<HeapError> for CatalogError {
    fn from(e: HeapError) -> Self {
        CatalogError::Heap(e)
    }
}

struct Table {
    name: String,
    file: Arc<HeapFile>,
    primary_key: String,
}

#[derive(Default)]
struct CatalogState {
    by_name: HashMap<String, TableId>,
    tables: HashMap<TableId, Table>,
}

/// Table-name ↔ table-id registry.
///
/// Interior-mutable so it can be shared behind an `Arc` between the
/// buffer pool and the query layer while tables are still being added.
#[derive(Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Registers a table.
    ///
    /// On a name conflict the new table wins and the old registration is
    /// dropped.
    pub fn add_table(&self, file: Arc<HeapFile>, name: impl Into<String>, primary_key: impl Into<String>) {
        let name = name.into();
        let id = file.id();

        let mut state = self.state.write();
        if let Some(old_id) = state.by_name.insert(name.clone(), id) {
            if old_id != id {
                state.tables.remove(&old_id);
            }
        }
        state.tables.insert(
            id,
            Table {
                name,
                file,
                primary_key: primary_key.into(),
            },
        );
    }

    /// Returns the id of the named table.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoSuchTable` if the name is unknown.
    pub fn table_id(&self, name: &str) -> Result<TableId, CatalogError> {
        self.state
            .read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::NoSuchTable(name.to_string()))
    }

    /// Returns the heap file backing the given table.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoSuchTableId` if the id is unknown.
    pub fn file(&self, id: TableId) -> Result<Arc<HeapFile>, CatalogError> {
        self.state
            .read()
            .tables
            .get(&id)
            .map(|t| Arc::clone(&t.file))
            .ok_or(CatalogError::NoSuchTableId(id))
    }

    /// Returns the schema of the given table.
    pub fn tuple_desc(&self, id: TableId) -> Result<TupleDesc, CatalogError> {
        Ok(self.file(id)?.desc().clone())
    }

    /// Returns the name of the given table.
    pub fn table_name(&self, id: TableId) -> Result<String, CatalogError> {
        self.state
            .read()
            .tables
            .get(&id)
            .map(|t| t.name.clone())
            .ok_or(CatalogError::NoSuchTableId(id))
    }

    /// Returns the primary-key column name of the given table.
    pub fn primary_key(&self, id: TableId) -> Result<String, CatalogError> {
        self.state
            .read()
            .tables
            .get(&id)
            .map(|t| t.primary_key.clone())
            .ok_or(CatalogError::NoSuchTableId(id))
    }

    /// Returns the ids of all registered tables.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.state.read().tables.keys().copied().collect()
    }

    /// Drops every registration.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.by_name.clear();
        state.tables.clear();
    }

    /// Loads table definitions from a schema text file.
    ///
    /// One table per line, `name (col type [pk], col type [pk], ...)`,
    /// with `type` one of `int` and `string`. Each table's data file is
    /// `<dir>/<name>.dat` next to the schema file. Returns the ids of the
    /// tables added, in file order.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Schema` on any malformed line, or the
    /// underlying error if a data file cannot be opened.
    pub fn load_schema(&self, path: impl AsRef<Path>) -> Result<Vec<TableId>, CatalogError> {
        let path = path.as_ref();
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let text = std::fs::read_to_string(path)?;

        let mut added = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (name, rest) = line
                .split_once('(')
                .ok_or_else(|| CatalogError::Schema(line.to_string()))?;
            let name = name.trim();
            let columns = rest
                .strip_suffix(')')
                .ok_or_else(|| CatalogError::Schema(line.to_string()))?;

            let mut fields = Vec::new();
            let mut primary_key = String::new();
            for column in columns.split(',') {
                let mut parts = column.split_whitespace();
                let col_name = parts
                    .next()
                    .ok_or_else(|| CatalogError::Schema(line.to_string()))?;
                let ty = parts
                    .next()
                    .and_then(FieldType::parse)
                    .ok_or_else(|| CatalogError::Schema(line.to_string()))?;
                if parts.next() == Some("pk") {
                    primary_key = col_name.to_string();
                }
                fields.push((ty, Some(col_name.to_string())));
            }

            let desc = TupleDesc::new(fields);
            let file = Arc::new(HeapFile::open(base.join(format!("{}.dat", name)), desc)?);
            added.push(file.id());
            self.add_table(file, name, primary_key);
        }
        Ok(added)
    }
}
