//! Tests for loader module

use super::*;
use crate::database::ColumnType;
use crate::decode::DecoderFormat;
use crate::error::Error;
use crate::schedule::Schedule;
use crate::types::{Cadence, Phase};
use pretty_assertions::assert_eq;
use test_case::test_case;

const MINIMAL: &str = r#"
name: cbp
table: county_business_patterns
phase: phase1
schedule:
  kind: annual_after_release
  month: 3
source:
  url: https://example.gov/cbp.csv
  format: csv
columns:
  - name: fips
  - name: establishments
    source: ESTAB
    type: integer
primary_key: [fips]
"#;

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_load_minimal_dataset() {
    let def = load_dataset_from_str(MINIMAL).unwrap();

    assert_eq!(def.name, "cbp");
    assert_eq!(def.table, "county_business_patterns");
    assert_eq!(def.phase, Phase::Phase1);
    assert_eq!(def.schedule, Schedule::AnnualAfterRelease { month: 3 });
    assert_eq!(def.cadence(), Cadence::Annual);
    assert_eq!(def.source.format, DecoderFormat::Csv);
    assert!(def.source.params.is_empty());
    assert_eq!(def.primary_key, vec!["fips".to_string()]);

    assert_eq!(def.columns[0].source_field(), "fips");
    assert_eq!(def.columns[0].column_type, ColumnType::Text);
    assert_eq!(def.columns[1].source_field(), "ESTAB");
    assert_eq!(def.columns[1].column_type, ColumnType::Integer);
}

#[test]
fn test_cadence_override() {
    let yaml = MINIMAL.replace("phase: phase1\n", "phase: phase1\ncadence: quarterly\n");
    let def = load_dataset_from_str(&yaml).unwrap();
    assert_eq!(def.cadence(), Cadence::Quarterly);
}

#[test]
fn test_json_source_with_params() {
    let yaml = r#"
name: rates
table: rates
phase: phase2
schedule: { kind: monthly }
source:
  url: https://example.gov/rates
  params:
    sort: -record_date
    "page[size]": "100"
  records_path: data
columns:
  - { name: record_date, type: date }
  - { name: rate, type: number }
"#;
    let def = load_dataset_from_str(yaml).unwrap();
    assert_eq!(def.source.format, DecoderFormat::Json);
    assert_eq!(def.source.params.get("page[size]").unwrap(), "100");

    let config = def.source.decoder_config();
    assert_eq!(config.records_path.as_deref(), Some("data"));
    assert!(def.primary_key.is_empty());
}

#[test]
fn test_table_spec() {
    let spec = load_dataset_from_str(MINIMAL).unwrap().table_spec();
    assert_eq!(spec.name, "county_business_patterns");
    assert_eq!(
        spec.columns
            .iter()
            .map(|c| (c.name.as_str(), c.column_type))
            .collect::<Vec<_>>(),
        vec![
            ("fips", ColumnType::Text),
            ("establishments", ColumnType::Integer)
        ]
    );
    assert_eq!(spec.primary_key, vec!["fips".to_string()]);
}

// ============================================================================
// Validation
// ============================================================================

#[test_case("name: cbp", "name: \"\"", "name cannot be empty" ; "empty name")]
#[test_case("table: county_business_patterns", "table: \"\"", "table cannot be empty" ; "empty table")]
#[test_case("name: cbp", "name: \"../x\"", "lowercase letters, digits and underscores" ; "parent dir name")]
#[test_case("name: cbp", "name: a/b", "lowercase letters, digits and underscores" ; "nested path name")]
#[test_case("name: cbp", "name: County-CBP", "lowercase letters, digits and underscores" ; "mixed case name")]
#[test_case("url: https://example.gov/cbp.csv", "url: \"\"", "url cannot be empty" ; "empty url")]
#[test_case("month: 3", "month: 13", "release month" ; "bad release month")]
#[test_case("primary_key: [fips]", "primary_key: [geo_id]", "primary key column 'geo_id'" ; "undeclared key")]
#[test_case("  - name: establishments", "  - name: fips", "declares column 'fips' twice" ; "duplicate column")]
#[test_case("url: https://example.gov/cbp.csv", "url: \"https://example.gov/{{ config.key }}\"", "unsupported variable" ; "bad template root")]
fn test_validation_errors(from: &str, to: &str, message: &str) {
    let yaml = MINIMAL.replace(from, to);
    let err = load_dataset_from_str(&yaml).unwrap_err();
    assert!(
        err.to_string().contains(message),
        "expected '{message}' in '{err}'"
    );
}

#[test]
fn test_no_columns_is_error() {
    let yaml = r#"
name: empty
table: empty
phase: phase3
schedule: { kind: daily }
source: { url: "https://example.gov" }
columns: []
"#;
    let err = load_dataset_from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("at least one column"));
}

#[test]
fn test_unknown_schedule_kind_is_parse_error() {
    let yaml = MINIMAL.replace("kind: annual_after_release", "kind: fortnightly");
    let err = load_dataset_from_str(&yaml).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(err.to_string().contains("Failed to parse dataset YAML"));
}

// ============================================================================
// Files and directories
// ============================================================================

#[test]
fn test_load_datasets_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.yaml"), MINIMAL.replace("name: cbp", "name: b")).unwrap();
    std::fs::write(dir.path().join("a.yml"), MINIMAL.replace("name: cbp", "name: a")).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let defs = load_datasets_dir(dir.path()).unwrap();
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_load_dataset_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "name: [").unwrap();

    let err = load_dataset(&path).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn test_missing_dir_is_config_error() {
    let err = load_datasets_dir("/definitely/not/here").unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

// ============================================================================
// Built-ins
// ============================================================================

#[test]
fn test_builtin_definitions_parse() {
    let defs = load_builtin().unwrap();
    assert_eq!(defs.len(), BUILTIN_DATASETS.len());

    // File key matches the declared name
    for (def, name) in defs.iter().zip(list_builtin()) {
        assert_eq!(def.name, name);
    }
}

#[test]
fn test_builtins_cover_every_schedule_family() {
    let defs = load_builtin().unwrap();
    let has = |f: fn(&Schedule) -> bool| defs.iter().any(|d| f(&d.schedule));

    assert!(has(|s| matches!(s, Schedule::Daily)));
    assert!(has(|s| matches!(s, Schedule::Weekly)));
    assert!(has(|s| matches!(s, Schedule::Monthly)));
    assert!(has(|s| matches!(s, Schedule::AnnualAfterRelease { .. })));
    assert!(has(|s| matches!(s, Schedule::QuarterlyWithLag { .. })));
    assert!(has(|s| matches!(s, Schedule::QuarterlyAfterDelay { .. })));
}

#[test]
fn test_get_builtin() {
    assert!(get_builtin("fred_gdp").unwrap().contains("FRED_API_KEY"));
    assert!(get_builtin("stripe").is_none());
}
