//! Shared import/export helpers for the quote list.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Quote;

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Interchange shape of imports and exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSeed {
    pub text: String,
    pub category: String,
}

/// Parse an import payload: a JSON array of `{text, category}` objects.
///
/// The whole payload is rejected when it is not such an array or when any
/// entry has an empty text or category, so the caller's store stays
/// untouched on failure.
pub fn parse_import(payload: &str) -> Result<Vec<QuoteSeed>> {
    let seeds: Vec<QuoteSeed> = serde_json::from_str(payload)
        .map_err(|error| Error::InvalidInput(format!("invalid import file: {error}")))?;

    for (index, seed) in seeds.iter().enumerate() {
        if seed.text.trim().is_empty() || seed.category.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "import entry {} is missing text or category",
                index + 1
            )));
        }
    }

    Ok(seeds)
}

/// Convert a quote into its interchange shape.
#[must_use]
pub fn quote_to_seed(quote: &Quote) -> QuoteSeed {
    QuoteSeed {
        text: quote.text.clone(),
        category: quote.category.clone(),
    }
}

/// Render quotes as pretty-printed JSON; round-trips through import.
pub fn render_json_export(quotes: &[Quote]) -> serde_json::Result<String> {
    let items = quotes.iter().map(quote_to_seed).collect::<Vec<QuoteSeed>>();
    serde_json::to_string_pretty(&items)
}

/// Render quotes as a Markdown blockquote list.
#[must_use]
pub fn render_markdown_export(quotes: &[Quote]) -> String {
    let mut output = String::new();

    for (index, quote) in quotes.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let _ = writeln!(output, "> {}", quote.text);
        let _ = writeln!(output, "> — {}", quote.category);
    }

    output
}

/// Render quotes based on selected export format.
pub fn render_export(quotes: &[Quote], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(quotes),
        ExportFormat::Markdown => Ok(render_markdown_export(quotes)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("quotes-{timestamp_ms}.{}", format.extension())
}
