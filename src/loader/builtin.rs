//! Built-in dataset definitions embedded in the binary

use super::parser::load_dataset_from_str;
use super::types::DatasetDefinition;
use crate::error::{Result, ResultExt};

/// Built-in dataset YAML, in registration order
pub static BUILTIN_DATASETS: &[(&str, &str)] = &[
    // Treasury
    (
        "treasury_debt_to_penny",
        include_str!("../../datasets/treasury_debt_to_penny.yaml"),
    ),
    (
        "treasury_avg_interest_rates",
        include_str!("../../datasets/treasury_avg_interest_rates.yaml"),
    ),
    // FRED
    (
        "fred_initial_claims",
        include_str!("../../datasets/fred_initial_claims.yaml"),
    ),
    (
        "fred_unemployment_rate",
        include_str!("../../datasets/fred_unemployment_rate.yaml"),
    ),
    ("fred_gdp", include_str!("../../datasets/fred_gdp.yaml")),
    (
        "fred_house_price_index",
        include_str!("../../datasets/fred_house_price_index.yaml"),
    ),
    // BLS
    (
        "bls_qcew_annual",
        include_str!("../../datasets/bls_qcew_annual.yaml"),
    ),
];

/// Get a built-in definition's YAML by name
pub fn get_builtin(name: &str) -> Option<&'static str> {
    BUILTIN_DATASETS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, yaml)| *yaml)
}

/// List all built-in dataset names
pub fn list_builtin() -> Vec<&'static str> {
    BUILTIN_DATASETS.iter().map(|(n, _)| *n).collect()
}

/// Parse every built-in definition
pub fn load_builtin() -> Result<Vec<DatasetDefinition>> {
    BUILTIN_DATASETS
        .iter()
        .map(|(name, yaml)| {
            load_dataset_from_str(yaml).with_context(|| format!("built-in dataset '{name}'"))
        })
        .collect()
}
