//! Job source loading.
//!
//! A job source is a tabular file with a `keyword` column. Two encodings
//! are supported, selected by file extension: comma-separated (`.csv`) and
//! tab-separated (`.tsv`). Anything else is a fatal format error.

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::domain::{ItemKind, JobItem};
use crate::error::SourceError;

/// Load the ordered, deduplicated keyword list from a tabular file.
///
/// The `keyword` header is matched case-insensitively and the alternate
/// spelling `keywords` is accepted. Rows are trimmed; empty cells are
/// dropped; duplicates keep their first occurrence. An empty result is a
/// fatal `SourceError::Empty`.
pub fn load_job_items(path: &Path) -> Result<Vec<JobItem>, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let delimiter = match extension.as_str() {
        "csv" => b',',
        "tsv" => b'\t',
        other => return Err(SourceError::UnsupportedFormat(other.to_string())),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    let column = headers
        .iter()
        .position(|h| {
            let h = h.trim().to_ascii_lowercase();
            h == "keyword" || h == "keywords"
        })
        .ok_or(SourceError::MissingKeywordColumn)?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for record in reader.records() {
        let record = record?;
        let Some(raw) = record.get(column) else {
            continue;
        };
        let keyword = raw.trim();
        if keyword.is_empty() {
            continue;
        }
        if seen.insert(keyword.to_string()) {
            items.push(JobItem::new(keyword, ItemKind::Primary));
        }
    }

    if items.is_empty() {
        return Err(SourceError::Empty);
    }

    debug!(count = items.len(), source = %path.display(), "Loaded job items");
    Ok(items)
}
