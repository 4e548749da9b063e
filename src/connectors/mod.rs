//! Dataset connectors
//!
//! [`HttpDataset`] turns a declarative [`DatasetDefinition`] into a
//! [`Dataset`](crate::dataset::Dataset). [`build_registry`] registers the
//! built-in definitions plus any found in a user directory.

mod http_dataset;

pub use http_dataset::{to_cell, HttpDataset};

use crate::error::Result;
use crate::loader::{self, DatasetDefinition};
use crate::registry::Registry;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Register one `HttpDataset` per definition, in order
pub fn registry_from_definitions(
    definitions: impl IntoIterator<Item = DatasetDefinition>,
) -> Result<Registry> {
    let mut registry = Registry::new();
    for definition in definitions {
        debug!(dataset = %definition.name, "Registering dataset");
        registry.register(Arc::new(HttpDataset::new(definition)))?;
    }
    Ok(registry)
}

/// Built-in datasets followed by the definitions in `datasets_dir`
pub fn build_registry(datasets_dir: Option<&Path>) -> Result<Registry> {
    let mut definitions = loader::load_builtin()?;
    if let Some(dir) = datasets_dir {
        definitions.extend(loader::load_datasets_dir(dir)?);
    }
    registry_from_definitions(definitions)
}
