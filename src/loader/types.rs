//! Loader types
//!
//! Declarative dataset definition types for YAML parsing.

use crate::database::{ColumnSpec, ColumnType, TableSpec};
use crate::decode::{DecoderConfig, DecoderFormat};
use crate::schedule::Schedule;
use crate::types::{Cadence, Phase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Dataset Definition
// ============================================================================

/// Top-level dataset definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatasetDefinition {
    /// Unique dataset name, also the sync log key
    pub name: String,
    /// Human readable description
    #[serde(default)]
    pub description: Option<String>,
    /// Destination table
    pub table: String,
    /// Grouping for selective runs
    pub phase: Phase,
    /// When the dataset is due
    pub schedule: Schedule,
    /// Nominal cadence; derived from the schedule when omitted
    #[serde(default)]
    pub cadence: Option<Cadence>,
    /// Where to fetch from
    pub source: SourceDefinition,
    /// Destination columns, in table order
    pub columns: Vec<ColumnDefinition>,
    /// Upsert key columns
    #[serde(default)]
    pub primary_key: Vec<String>,
}

impl DatasetDefinition {
    /// Declared cadence, or the one implied by the schedule
    pub fn cadence(&self) -> Cadence {
        self.cadence.unwrap_or_else(|| self.schedule.cadence())
    }

    /// Destination table description
    pub fn table_spec(&self) -> TableSpec {
        TableSpec {
            name: self.table.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| ColumnSpec::new(&c.name, c.column_type))
                .collect(),
            primary_key: self.primary_key.clone(),
        }
    }
}

// ============================================================================
// Source Definition
// ============================================================================

/// HTTP source of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SourceDefinition {
    /// URL, may contain `{{ env.X }}` / `{{ vars.X }}` templates
    pub url: String,
    /// Query parameters (values may be templates)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Body format
    #[serde(default)]
    pub format: DecoderFormat,
    /// Dot path to the record array (JSON)
    #[serde(default)]
    pub records_path: Option<String>,
    /// Field delimiter (CSV)
    #[serde(default)]
    pub csv_delimiter: Option<char>,
}

impl SourceDefinition {
    pub fn decoder_config(&self) -> DecoderConfig {
        DecoderConfig {
            format: self.format,
            records_path: self.records_path.clone(),
            csv_delimiter: self.csv_delimiter,
        }
    }
}

// ============================================================================
// Column Definition
// ============================================================================

/// Mapping of one record field onto one table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ColumnDefinition {
    /// Column name in the destination table
    pub name: String,
    /// Record field to read; defaults to `name`
    #[serde(default)]
    pub source: Option<String>,
    /// Column type
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    /// Record field this column reads
    pub fn source_field(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.name)
    }
}
