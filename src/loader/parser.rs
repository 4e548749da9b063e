//! YAML parser for dataset definitions
//!
//! Parses and validates dataset YAML, from strings, single files or a
//! directory of files.

use super::types::DatasetDefinition;
use crate::error::{Error, Result};
use crate::template;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Dataset names double as sync log keys and download file stems
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_]+$").expect("dataset name regex is valid"));

/// Load a dataset definition from a YAML file
pub fn load_dataset(path: impl AsRef<Path>) -> Result<DatasetDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read dataset file '{}': {e}",
            path.display()
        ))
    })?;
    load_dataset_from_str(&content)
        .map_err(|e| Error::config(format!("{}: {e}", path.display())))
}

/// Load a dataset definition from a YAML string
pub fn load_dataset_from_str(yaml: &str) -> Result<DatasetDefinition> {
    let def: DatasetDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse dataset YAML: {e}")))?;

    validate_dataset(&def)?;
    Ok(def)
}

/// Load every `*.yaml` / `*.yml` file in a directory, ordered by file name
pub fn load_datasets_dir(dir: impl AsRef<Path>) -> Result<Vec<DatasetDefinition>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| {
        Error::config(format!(
            "Failed to read datasets directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if path.is_file() && is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            debug!("Loading dataset definition {}", path.display());
            load_dataset(path)
        })
        .collect()
}

/// Validate a dataset definition
pub fn validate_dataset(def: &DatasetDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Dataset name cannot be empty"));
    }

    if !NAME_REGEX.is_match(&def.name) {
        return Err(Error::invalid_value(
            "name",
            format!(
                "'{}' must contain only lowercase letters, digits and underscores",
                def.name
            ),
        ));
    }

    if def.table.trim().is_empty() {
        return Err(Error::config(format!(
            "Dataset '{}' table cannot be empty",
            def.name
        )));
    }

    if def.source.url.trim().is_empty() {
        return Err(Error::config(format!(
            "Dataset '{}' source url cannot be empty",
            def.name
        )));
    }

    def.schedule
        .validate()
        .map_err(|e| Error::config(format!("Dataset '{}': {e}", def.name)))?;

    template::validate(&def.source.url)?;
    for value in def.source.params.values() {
        template::validate(value)?;
    }

    if def.columns.is_empty() {
        return Err(Error::config(format!(
            "Dataset '{}' must declare at least one column",
            def.name
        )));
    }

    let mut names = HashSet::new();
    for column in &def.columns {
        if column.name.trim().is_empty() {
            return Err(Error::config(format!(
                "Dataset '{}' has a column with an empty name",
                def.name
            )));
        }
        if !names.insert(column.name.as_str()) {
            return Err(Error::config(format!(
                "Dataset '{}' declares column '{}' twice",
                def.name, column.name
            )));
        }
    }

    for key in &def.primary_key {
        if !names.contains(key.as_str()) {
            return Err(Error::config(format!(
                "Dataset '{}' primary key column '{key}' is not declared",
                def.name
            )));
        }
    }

    Ok(())
}
