use serde::Serialize;
use std::{fs::File, io::BufWriter, path::Path};

use crate::{api::RowOutcome, config::error_reference_url, error::Result, pipeline::RowResult};
use reqwest::Url;

/// One failed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub id: i64,
    pub row: u32,
    /// Request URL that was attempted.
    pub url: String,
    pub reason: String,
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<ErrorEntry>,
}

impl Report {
    pub fn from_results(results: &[RowResult]) -> Self {
        results.iter().fold(Self::default(), |mut report, r| {
            match &r.outcome {
                RowOutcome::Updated(_) => report.updated += 1,
                RowOutcome::Skipped(_) => report.skipped += 1,
                RowOutcome::Failed { kind, request_url } => report.errors.push(ErrorEntry {
                    id: r.id,
                    row: r.row,
                    url: request_url.clone(),
                    reason: kind.to_string(),
                }),
            }
            report
        })
    }

    /// One printable block per failed row.
    pub fn lines(&self, error_page: &Url) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                format!(
                    "Invalid URL {} \n\tExcel row: {} \n\tEndpoint: {} \n\tReason: {}",
                    error_reference_url(error_page, e.id),
                    e.row,
                    e.url,
                    e.reason
                )
            })
            .collect()
    }

    /// Writes the failed rows as a pretty-printed JSON array.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(out, &self.errors)?;
        Ok(())
    }
}
