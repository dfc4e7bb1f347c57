//! Output formats for parsed documents.

pub mod cbor;
pub mod yaml;

use clap::ValueEnum;
use libbru::Document;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
    Cbor,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Cbor => "cbor",
        }
    }
}

/// Encode a document in the given format.
pub fn encode(document: &Document, format: Format) -> Result<Vec<u8>, String> {
    match format {
        Format::Json => {
            let mut text = serde_json::to_string_pretty(document)
                .map_err(|e| format!("JSON encode error: {}", e))?;
            text.push('\n');
            Ok(text.into_bytes())
        }
        Format::Yaml => yaml::encode(document).map(String::into_bytes),
        Format::Cbor => cbor::encode(document),
    }
}
