//! Dataset registry
//!
//! Holds every constructed dataset in registration order and resolves the
//! subset a run should cover.

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::types::Phase;
use std::collections::HashMap;
use std::sync::Arc;

/// Lookup table of constructed datasets
#[derive(Default)]
pub struct Registry {
    datasets: Vec<Arc<dyn Dataset>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset; names must be unique
    pub fn register(&mut self, dataset: Arc<dyn Dataset>) -> Result<()> {
        let name = dataset.name().to_string();
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateDataset { name });
        }
        self.index.insert(name, self.datasets.len());
        self.datasets.push(dataset);
        Ok(())
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, dataset: Arc<dyn Dataset>) -> Result<Self> {
        self.register(dataset)?;
        Ok(self)
    }

    /// Datasets matching an optional phase and an optional name allow-list.
    ///
    /// Both filters intersect. Results keep registration order. An explicit
    /// name that is not registered is an error rather than a silent skip.
    pub fn select(&self, phase: Option<Phase>, names: &[String]) -> Result<Vec<Arc<dyn Dataset>>> {
        for name in names {
            if !self.index.contains_key(name) {
                return Err(Error::dataset_not_found(name));
            }
        }

        Ok(self
            .datasets
            .iter()
            .filter(|d| phase.map_or(true, |p| d.phase() == p))
            .filter(|d| names.is_empty() || names.iter().any(|n| n == d.name()))
            .cloned()
            .collect())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Dataset>> {
        self.index.get(name).map(|&i| Arc::clone(&self.datasets[i]))
    }

    /// Registered names in registration order
    pub fn all_names(&self) -> Vec<String> {
        self.datasets.iter().map(|d| d.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Dataset>> {
        self.datasets.iter()
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("datasets", &self.all_names())
            .finish()
    }
}
