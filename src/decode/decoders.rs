//! Decoder implementations

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use serde_json::{Map, Value};

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder with optional record path extraction
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// Dot path to the records, e.g. `data` or `$.results.rows`
    records_path: Option<String>,
}

impl JsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            records_path: Some(path.into()),
        }
    }

    fn extract_records(&self, value: Value) -> Result<Vec<Value>> {
        let target = match &self.records_path {
            Some(path) => extract_simple_path(&value, path).ok_or_else(|| {
                Error::decode(format!("records path '{path}' not found in response"))
            })?,
            None => value,
        };

        match target {
            Value::Array(records) => Ok(records),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &str) -> Result<Vec<Value>> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))?;
        self.extract_records(value)
    }
}

// ============================================================================
// CSV Decoder
// ============================================================================

/// CSV decoder; the first row names the fields
#[derive(Debug, Clone)]
pub struct CsvDecoder {
    delimiter: char,
}

impl Default for CsvDecoder {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

impl CsvDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl RecordDecoder for CsvDecoder {
    fn decode(&self, body: &str) -> Result<Vec<Value>> {
        // Government exports often carry a BOM
        let body = body.strip_prefix('\u{feff}').unwrap_or(body);
        let mut lines = body.lines().filter(|l| !l.trim().is_empty());

        let Some(header_line) = lines.next() else {
            return Ok(Vec::new());
        };
        let headers = parse_csv_line(header_line, self.delimiter);

        let mut records = Vec::new();
        for (row, line) in lines.enumerate() {
            let fields = parse_csv_line(line, self.delimiter);
            if fields.len() > headers.len() {
                return Err(Error::CsvParse {
                    message: format!(
                        "row {} has {} fields, header has {}",
                        row + 2,
                        fields.len(),
                        headers.len()
                    ),
                });
            }

            let mut obj = Map::new();
            for (i, header) in headers.iter().enumerate() {
                let value = fields.get(i).map_or(Value::Null, |f| parse_csv_value(f));
                obj.insert(header.clone(), value);
            }
            records.push(Value::Object(obj));
        }

        Ok(records)
    }
}

/// Split one CSV line, honouring double quotes and `""` escapes
fn parse_csv_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }

    fields.push(current.trim().to_string());
    fields
}

/// One CSV field as JSON. Fields stay text so codes like `01001` keep
/// their leading zeros; typed columns convert later.
fn parse_csv_value(value: &str) -> Value {
    if value.is_empty() || value.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Extract a value using a dot path; `items[0]` and `items[-1]` index arrays
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value.clone());
    }

    let mut current = value;
    for part in path.split('.') {
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            #[allow(clippy::cast_possible_wrap)]
            let idx = if index < 0 {
                usize::try_from(arr.len() as i64 + index).ok()?
            } else {
                usize::try_from(index).ok()?
            };
            current = arr.get(idx)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}
