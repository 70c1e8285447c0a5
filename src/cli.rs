use clap::Parser;
use reqwest::Url;
use std::{path::PathBuf, time::Duration};

use crate::{
    config::Config,
    error::{EnrichError, Result},
};

/// Fill the Title/Body columns of an xlsx sheet from the article API.
#[derive(Parser, Debug)]
#[command(name = "xlsx-enrich", version, about)]
pub struct Cli {
    /// Workbook to update in place
    pub excel_path: PathBuf,

    /// Sheet holding the ID column
    #[arg(long, default_value = "ids")]
    pub sheet_name: String,

    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub type_id: i64,

    #[arg(long, default_value_t = 3, allow_hyphen_values = true)]
    pub interface_id: i64,

    /// JSON key copied into the Title column
    #[arg(long, default_value = "title")]
    pub title_key: String,

    /// JSON key copied into the Body column
    #[arg(long, default_value = "body")]
    pub body_key: String,

    /// Article API endpoint
    #[arg(long, env = "ENRICH_ENDPOINT")]
    pub endpoint: String,

    /// Base of the URL written into the Error column [default: the endpoint]
    #[arg(long, env = "ENRICH_ERROR_PAGE")]
    pub error_page: Option<String>,

    /// Per-request timeout, 0 disables it
    #[arg(long, env = "ENRICH_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Extra attempts after a network error or a 5xx/429 response
    #[arg(long, env = "ENRICH_RETRIES", default_value_t = 2)]
    pub retries: u32,

    /// First retry delay; doubles on each further attempt
    #[arg(long, default_value_t = 500)]
    pub retry_backoff_ms: u64,

    /// Also write the failed rows to this JSON file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Include the xlsx engine's debug output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        let endpoint = parse_url("endpoint", &self.endpoint)?;
        let error_page = match self.error_page.as_deref() {
            Some(page) => parse_url("error page", page)?,
            None => endpoint.clone(),
        };

        Ok(Config {
            excel_path: self.excel_path,
            sheet_name: self.sheet_name,
            type_id: self.type_id,
            interface_id: self.interface_id,
            title_key: self.title_key,
            body_key: self.body_key,
            endpoint,
            error_page,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            retries: self.retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            report_path: self.report,
        })
    }
}

fn parse_url(what: &'static str, value: &str) -> Result<Url> {
    let url = Url::parse(value.trim()).map_err(|e| EnrichError::InvalidEndpoint {
        what,
        value: value.to_owned(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EnrichError::InvalidEndpoint {
            what,
            value: value.to_owned(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}
