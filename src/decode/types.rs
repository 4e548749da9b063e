//! Decoder types and traits

use super::decoders::{CsvDecoder, JsonDecoder};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of a downloaded body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderFormat {
    /// JSON document (default)
    #[default]
    Json,
    /// Delimited text with a header row
    Csv,
}

impl DecoderFormat {
    /// File extension used for downloads of this format
    pub fn extension(self) -> &'static str {
        match self {
            DecoderFormat::Json => "json",
            DecoderFormat::Csv => "csv",
        }
    }
}

/// How to turn a body into records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    pub format: DecoderFormat,
    /// Dot path to the record array (JSON only)
    pub records_path: Option<String>,
    /// Field delimiter (CSV only, default comma)
    pub csv_delimiter: Option<char>,
}

impl DecoderConfig {
    pub fn json() -> Self {
        Self::default()
    }

    pub fn json_with_path(path: impl Into<String>) -> Self {
        Self {
            records_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn csv() -> Self {
        Self {
            format: DecoderFormat::Csv,
            csv_delimiter: Some(','),
            ..Self::default()
        }
    }

    pub fn csv_with_delimiter(delimiter: char) -> Self {
        Self {
            format: DecoderFormat::Csv,
            csv_delimiter: Some(delimiter),
            ..Self::default()
        }
    }

    /// Build the decoder this config describes
    pub fn decoder(&self) -> Box<dyn RecordDecoder> {
        match self.format {
            DecoderFormat::Json => match &self.records_path {
                Some(path) => Box::new(JsonDecoder::with_path(path.clone())),
                None => Box::new(JsonDecoder::new()),
            },
            DecoderFormat::Csv => {
                Box::new(CsvDecoder::with_delimiter(self.csv_delimiter.unwrap_or(',')))
            }
        }
    }
}

/// Turns a body into a list of JSON object records
pub trait RecordDecoder: Send + Sync {
    fn decode(&self, body: &str) -> Result<Vec<Value>>;
}
