//! DuckDB-backed relational store
//!
//! A single DuckDB connection behind a mutex, shared by every dataset and
//! by the sync log. DuckDB serialises writers internally, so one handle is
//! all the pipeline needs. Blocking work should go through
//! [`Store::run_blocking`] when called from async code.

use crate::error::{Error, Result};
use duckdb::types::Value as DbValue;
use duckdb::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex};

// ============================================================================
// Table description
// ============================================================================

/// Column type in a destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Number,
    Boolean,
    Date,
}

impl ColumnType {
    /// DuckDB type name
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Text => "VARCHAR",
            ColumnType::Integer => "BIGINT",
            ColumnType::Number => "DOUBLE",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
        }
    }
}

/// A destination column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A destination table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    /// Upsert key; empty means append-only inserts
    pub primary_key: Vec<String>,
}

impl TableSpec {
    /// `CREATE TABLE IF NOT EXISTS` statement for this table
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type.sql_type()))
            .collect();
        if !self.primary_key.is_empty() {
            let keys: Vec<String> = self.primary_key.iter().map(|k| quote_ident(k)).collect();
            parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            parts.join(", ")
        )
    }

    /// Parameterised insert statement, `INSERT OR REPLACE` when keyed
    pub fn insert_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<&str> = self
            .columns
            .iter()
            .map(|c| match c.column_type {
                ColumnType::Date => "CAST(? AS DATE)",
                _ => "?",
            })
            .collect();
        let verb = if self.primary_key.is_empty() {
            "INSERT"
        } else {
            "INSERT OR REPLACE"
        };
        format!(
            "{verb} INTO {} ({}) VALUES ({})",
            quote_ident(&self.name),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn key_positions(&self) -> Vec<usize> {
        self.primary_key
            .iter()
            .filter_map(|k| self.columns.iter().position(|c| &c.name == k))
            .collect()
    }
}

/// A single typed cell of a row
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    fn to_db(&self) -> DbValue {
        match self {
            Cell::Null => DbValue::Null,
            Cell::Text(s) => DbValue::Text(s.clone()),
            Cell::Integer(n) => DbValue::BigInt(*n),
            Cell::Number(n) => DbValue::Double(*n),
            Cell::Boolean(b) => DbValue::Boolean(*b),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Integer(n) => write!(f, "{n}"),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Quote an identifier for DuckDB
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// Store
// ============================================================================

/// Shared handle to the relational store
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    location: String,
}

impl Store {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: path.display().to_string(),
        })
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location: ":memory:".to_string(),
        })
    }

    /// Where the database lives (path or `:memory:`)
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Run a closure with exclusive access to the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| Error::store("connection mutex poisoned"))?;
        f(&mut guard)
    }

    /// Run a closure on the blocking thread pool
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.with_conn(f)).await?
    }

    /// Create the table if it does not exist yet
    pub fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        let sql = spec.create_sql();
        tracing::debug!("Executing: {}", sql);
        self.with_conn(|conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
    }

    /// Insert or replace rows in one transaction, returning rows written.
    ///
    /// Rows sharing a primary key are collapsed, the last one wins.
    pub fn upsert(&self, spec: &TableSpec, rows: &[Vec<Cell>]) -> Result<usize> {
        if let Some(bad) = rows.iter().find(|r| r.len() != spec.columns.len()) {
            return Err(Error::store(format!(
                "row has {} cells but table '{}' has {} columns",
                bad.len(),
                spec.name,
                spec.columns.len()
            )));
        }

        let rows = dedupe_by_key(spec, rows);
        let sql = spec.insert_sql();

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in &rows {
                    let values: Vec<DbValue> = row.iter().map(Cell::to_db).collect();
                    stmt.execute(params_from_iter(values.iter()))?;
                }
            }
            tx.commit()?;
            Ok(rows.len())
        })
    }

    /// Delete every row in a table
    pub fn truncate(&self, table: &str) -> Result<()> {
        let sql = format!("DELETE FROM {}", quote_ident(table));
        self.with_conn(|conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
    }

    /// Number of rows in a table
    pub fn count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT count(*) FROM {}", quote_ident(table));
        self.with_conn(|conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
    }

    /// Whether a table exists in the main schema
    pub fn table_exists(&self, table: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT count(*) FROM information_schema.tables WHERE table_name = ?",
                params![table],
                |row| row.get(0),
            )?;
            Ok(n > 0)
        })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

fn dedupe_by_key<'a>(spec: &TableSpec, rows: &'a [Vec<Cell>]) -> Vec<&'a Vec<Cell>> {
    let positions = spec.key_positions();
    if positions.is_empty() {
        return rows.iter().collect();
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<&Vec<Cell>> = Vec::with_capacity(rows.len());
    for row in rows {
        let key = positions
            .iter()
            .map(|&i| row[i].to_string())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        match index.get(&key) {
            Some(&slot) => out[slot] = row,
            None => {
                index.insert(key, out.len());
                out.push(row);
            }
        }
    }
    out
}
