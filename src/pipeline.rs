//! The batch loop: fetch each ID, write the row, save.

use crate::{
    api::{ArticleClient, ArticleSource, RowOutcome},
    config::Config,
    error::Result,
    report::Report,
    sheet::{EnrichSheet, IdRow},
};

/// Outcome of one ID, tied to its sheet row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    pub id: i64,
    pub row: u32,
    pub outcome: RowOutcome,
}

/// Fetches every row in order and writes the result into the sheet.
///
/// The workbook is saved after each row that changed it, so an interrupted
/// run keeps everything up to the last finished row. A save failure stops
/// the batch.
pub fn process_rows<S: ArticleSource>(
    sheet: &mut EnrichSheet,
    source: &S,
    rows: &[IdRow],
    config: &Config,
) -> Result<Vec<RowResult>> {
    let mut results = Vec::with_capacity(rows.len());

    for (n, &IdRow { id, row }) in rows.iter().enumerate() {
        log::debug!("[{}/{}] ID {id} (row {row})", n + 1, rows.len());
        let outcome = source.fetch(id);

        match &outcome {
            RowOutcome::Updated(article) => {
                sheet.write_article(row, article)?;
            }
            RowOutcome::Skipped(reason) => {
                log::warn!("ID {id} (row {row}) skipped: {reason}");
            }
            RowOutcome::Failed { kind, request_url } => {
                log::error!("ID {id} (row {row}): {kind} [{request_url}]");
                sheet.write_error(row, &config.error_reference_url(id))?;
            }
        }
        if sheet.is_dirty() {
            sheet.save()?;
        }

        results.push(RowResult { id, row, outcome });
    }

    if sheet.is_dirty() {
        sheet.save()?;
    }
    Ok(results)
}

/// Runs the whole job. `None` means the sheet had no valid IDs and nothing
/// was fetched or saved.
pub fn run(config: &Config) -> Result<Option<Report>> {
    let mut sheet = EnrichSheet::open(&config.excel_path, &config.sheet_name)?;
    let rows = sheet.collect_ids()?;
    if rows.is_empty() {
        log::debug!("No valid IDs found in the sheet");
        return Ok(None);
    }
    log::debug!("Found {} IDs in sheet '{}'", rows.len(), config.sheet_name);

    let client = ArticleClient::new(config)?;
    run_with(&mut sheet, &client, &rows, config).map(Some)
}

/// Processes `rows` with `source`, then prints and optionally writes the report.
pub fn run_with<S: ArticleSource>(
    sheet: &mut EnrichSheet,
    source: &S,
    rows: &[IdRow],
    config: &Config,
) -> Result<Report> {
    let results = process_rows(sheet, source, rows, config)?;
    let report = Report::from_results(&results);

    for line in report.lines(&config.error_page) {
        log::error!("{line}");
    }
    if let Some(path) = &config.report_path {
        report.write_json(path)?;
        log::debug!("Wrote {} failed rows to {}", report.errors.len(), path.display());
    }
    log::info!(
        "Processing completed: {} updated, {} skipped, {} failed",
        report.updated,
        report.skipped,
        report.errors.len()
    );
    Ok(report)
}
