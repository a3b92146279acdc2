use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use tracing::info;

use crate::error::{CapitalIqError, Result};
use crate::fmt::{fixed2, json_scalar};
use crate::models::Anomaly;

pub const CSV_FILE_NAME: &str = "anomalous_transactions.csv";
pub const MISSING_CATEGORY: &str = "N/A";
pub const NO_ANOMALIES: &str = "No potential anomalies were detected in your file.";

/// Display-ready anomaly row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRow {
    pub time: String,
    pub amount: String,
    pub category: String,
}

impl From<&Anomaly> for AnomalyRow {
    fn from(a: &Anomaly) -> Self {
        Self {
            time: json_scalar(&a.time),
            amount: fixed2(a.amount),
            category: a.category_label().unwrap_or(MISSING_CATEGORY).to_string(),
        }
    }
}

pub fn rows(anomalies: &[Anomaly]) -> Vec<AnomalyRow> {
    anomalies.iter().map(AnomalyRow::from).collect()
}

pub fn summary(anomalies: &[Anomaly]) -> String {
    if anomalies.is_empty() {
        NO_ANOMALIES.to_string()
    } else {
        format!(
            "Found {} potentially anomalous transaction(s). Please review the items below.",
            anomalies.len()
        )
    }
}

/// CSV text for the anomalies, or `None` when there is nothing to export.
///
/// Header is bare; in data rows the category is always quoted.
pub fn to_csv(anomalies: &[Anomaly]) -> Result<Option<String>> {
    if anomalies.is_empty() {
        return Ok(None);
    }

    let mut header = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());
    header.write_record(["Time", "Amount", "Category"])?;
    let buf = header
        .into_inner()
        .map_err(|e| CapitalIqError::Other(e.to_string()))?;

    let mut body = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .quote_style(QuoteStyle::Never)
        .from_writer(buf);
    for row in rows(anomalies) {
        let category = quoted(&row.category);
        body.write_record([row.time.as_str(), row.amount.as_str(), category.as_str()])?;
    }
    let buf = body
        .into_inner()
        .map_err(|e| CapitalIqError::Other(e.to_string()))?;

    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| CapitalIqError::Other(e.to_string()))
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Write `anomalous_transactions.csv` into `dir`. No-op for an empty list.
pub fn export_csv(anomalies: &[Anomaly], dir: &Path) -> Result<Option<PathBuf>> {
    let Some(content) = to_csv(anomalies)? else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)?;
    let path = dir.join(CSV_FILE_NAME);
    std::fs::write(&path, content)?;
    info!(path = %path.display(), rows = anomalies.len(), "exported anomalies");
    Ok(Some(path))
}
