//! Relational store backed by DuckDB
//!
//! This module provides the shared database handle that datasets load into
//! and the sync log records runs in.

mod store;

pub use store::{quote_ident, Cell, ColumnSpec, ColumnType, Store, TableSpec};
