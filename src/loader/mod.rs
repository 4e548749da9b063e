//! YAML Loader module
//!
//! Parse dataset definitions from YAML.
//!
//! # Overview
//!
//! The loader module provides:
//! - `DatasetDefinition` - declarative description of one HTTP dataset
//! - YAML parsing with validation, from strings, files or a directory
//! - Built-in definitions compiled into the binary

mod builtin;
mod parser;
mod types;

pub use builtin::{get_builtin, list_builtin, load_builtin, BUILTIN_DATASETS};
pub use parser::{load_dataset, load_dataset_from_str, load_datasets_dir, validate_dataset};
pub use types::{ColumnDefinition, DatasetDefinition, SourceDefinition};

#[cfg(test)]
mod tests;
