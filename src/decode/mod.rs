//! Record decoder module
//!
//! Supports: JSON, CSV
//!
//! Declarative datasets download a body to the temp dir, then decode it into
//! JSON object records before mapping them onto table columns.

mod decoders;
mod types;

pub use decoders::{CsvDecoder, JsonDecoder};
pub use types::{DecoderConfig, DecoderFormat, RecordDecoder};
