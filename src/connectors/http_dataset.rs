//! Declarative HTTP dataset
//!
//! download -> decode -> map to typed cells -> upsert

use crate::database::{Cell, ColumnType, TableSpec};
use crate::dataset::{Dataset, SyncContext, SyncResult};
use crate::error::Result;
use crate::loader::DatasetDefinition;
use crate::schedule::Schedule;
use crate::template::{self, TemplateContext};
use crate::types::{Cadence, JsonValue, Phase};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

/// Date layouts seen in government feeds
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// A dataset described entirely by YAML
#[derive(Debug, Clone)]
pub struct HttpDataset {
    definition: DatasetDefinition,
    table: TableSpec,
}

impl HttpDataset {
    pub fn new(definition: DatasetDefinition) -> Self {
        let table = definition.table_spec();
        Self { definition, table }
    }

    pub fn definition(&self) -> &DatasetDefinition {
        &self.definition
    }

    /// Map decoded records onto table rows.
    ///
    /// Returns the rows plus the number of records dropped for a null key.
    pub fn map_records(&self, records: &[JsonValue]) -> (Vec<Vec<Cell>>, usize) {
        let key_positions: Vec<usize> = self
            .definition
            .primary_key
            .iter()
            .filter_map(|k| self.definition.columns.iter().position(|c| &c.name == k))
            .collect();

        let mut rows = Vec::with_capacity(records.len());
        let mut skipped = 0;
        for record in records {
            let row: Vec<Cell> = self
                .definition
                .columns
                .iter()
                .map(|column| {
                    record
                        .get(column.source_field())
                        .map_or(Cell::Null, |v| to_cell(v, column.column_type))
                })
                .collect();

            if key_positions.iter().any(|&i| row[i].is_null()) {
                skipped += 1;
                continue;
            }
            rows.push(row);
        }
        (rows, skipped)
    }

    fn render_request(&self, vars: &TemplateContext) -> Result<(String, Vec<(String, String)>)> {
        let url = template::render(&self.definition.source.url, vars)?;
        // Surface malformed URLs before any request is made
        url::Url::parse(&url)?;
        let params = self
            .definition
            .source
            .params
            .iter()
            .map(|(k, v)| -> Result<(String, String)> { Ok((k.clone(), template::render(v, vars)?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok((url, params))
    }
}

#[async_trait]
impl Dataset for HttpDataset {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn table(&self) -> &str {
        &self.definition.table
    }

    fn phase(&self) -> Phase {
        self.definition.phase
    }

    fn cadence(&self) -> Cadence {
        self.definition.cadence()
    }

    fn should_run(&self, now: DateTime<Utc>, last_sync: Option<DateTime<Utc>>) -> bool {
        self.definition.schedule.should_run(now, last_sync)
    }

    fn schedule(&self) -> Option<&Schedule> {
        Some(&self.definition.schedule)
    }

    async fn sync(&self, ctx: &SyncContext) -> Result<SyncResult> {
        let source = &self.definition.source;
        let (url, params) = self.render_request(&TemplateContext::for_run(ctx.now()))?;

        let dest = ctx
            .temp_dir()
            .join(format!("{}.{}", self.name(), source.format.extension()));
        // Log the template, never the rendered URL: it may carry an API key
        info!(source = %source.url, "Downloading");
        let bytes = ctx.fetcher.download(&url, &params, &dest).await?;
        ctx.check_cancelled()?;

        let body = tokio::fs::read_to_string(&dest).await?;
        let records = source.decoder_config().decoder().decode(&body)?;
        drop(body);
        if let Err(e) = tokio::fs::remove_file(&dest).await {
            debug!(path = %dest.display(), error = %e, "Could not remove download");
        }

        let (rows, skipped) = self.map_records(&records);
        if skipped > 0 {
            warn!(skipped, "Dropped records with a null primary key");
        }
        debug!(records = records.len(), rows = rows.len(), "Decoded");

        let store = ctx.store.clone();
        let table = self.table.clone();
        let full = ctx.full;
        let written = tokio::task::spawn_blocking(move || -> Result<usize> {
            store.ensure_table(&table)?;
            if full {
                store.truncate(&table.name)?;
            }
            store.upsert(&table, &rows)
        })
        .await??;

        Ok(SyncResult::new(written as i64)
            .with_meta("source_url", source.url.clone())
            .with_meta("bytes_downloaded", bytes)
            .with_meta("rows_skipped", skipped)
            .with_meta("full", full))
    }
}

/// Convert one record field to a cell of the column's type.
///
/// Values that cannot be read as the column type become null: feeds use
/// markers such as `.` or `(D)` for missing or suppressed numbers.
pub fn to_cell(value: &JsonValue, column_type: ColumnType) -> Cell {
    match (column_type, value) {
        (_, JsonValue::Null) => Cell::Null,

        (ColumnType::Text, JsonValue::String(s)) => Cell::Text(s.clone()),
        (ColumnType::Text, other) => Cell::Text(other.to_string()),

        (ColumnType::Integer, JsonValue::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map_or(Cell::Null, Cell::Integer),
        (ColumnType::Integer, JsonValue::String(s)) => {
            let s = clean_number(s);
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
                .map_or(Cell::Null, Cell::Integer)
        }

        (ColumnType::Number, JsonValue::Number(n)) => n.as_f64().map_or(Cell::Null, Cell::Number),
        (ColumnType::Number, JsonValue::String(s)) => clean_number(s)
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map_or(Cell::Null, Cell::Number),

        (ColumnType::Boolean, JsonValue::Bool(b)) => Cell::Boolean(*b),
        (ColumnType::Boolean, JsonValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Cell::Boolean(true),
            "false" | "f" | "no" | "n" | "0" => Cell::Boolean(false),
            _ => Cell::Null,
        },
        (ColumnType::Boolean, JsonValue::Number(n)) => {
            n.as_i64().map_or(Cell::Null, |i| Cell::Boolean(i != 0))
        }

        (ColumnType::Date, JsonValue::String(s)) => {
            parse_date(s).map_or(Cell::Null, |d| Cell::Text(d.format("%Y-%m-%d").to_string()))
        }

        _ => Cell::Null,
    }
}

fn clean_number(s: &str) -> String {
    s.trim().replace(',', "")
}

#[allow(clippy::cast_possible_truncation)]
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f.is_finite() && f.abs() < 9.0e15).then_some(f as i64)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    // Timestamps: keep the date part
    let s = s.trim().split('T').next().unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
