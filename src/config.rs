//! Run configuration and the fixed constants of the enrichment job.

use reqwest::Url;
use std::{path::PathBuf, time::Duration};

/// Smallest ID that is fetched.
pub const MIN_ID: i64 = 100;
/// Largest ID that is fetched.
pub const MAX_ID: i64 = 100_000;

pub const ID_HEADER: &str = "ID";
pub const TITLE_HEADER: &str = "Title";
pub const BODY_HEADER: &str = "Body";
pub const ERROR_HEADER: &str = "Error";

/// Sent with every request; the API rejects non-browser agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Everything one run needs, resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub excel_path: PathBuf,
    pub sheet_name: String,
    pub type_id: i64,
    pub interface_id: i64,
    pub title_key: String,
    pub body_key: String,
    pub endpoint: Url,
    /// Base of the error-reference URL written into the Error column.
    pub error_page: Url,
    /// `None` disables the request timeout.
    pub timeout: Option<Duration>,
    pub retries: u32,
    pub retry_backoff: Duration,
    pub report_path: Option<PathBuf>,
}

impl Config {
    /// Defaults matching the command line, for the given workbook and endpoint.
    pub fn new(excel_path: impl Into<PathBuf>, endpoint: Url) -> Self {
        Self {
            excel_path: excel_path.into(),
            sheet_name: "ids".into(),
            type_id: 0,
            interface_id: 3,
            title_key: "title".into(),
            body_key: "body".into(),
            error_page: endpoint.clone(),
            endpoint,
            timeout: Some(Duration::from_secs(30)),
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            report_path: None,
        }
    }

    pub fn error_reference_url(&self, id: i64) -> String {
        error_reference_url(&self.error_page, id)
    }
}

/// `<base>?id=<id>`; a query already on `base` is kept.
pub fn error_reference_url(base: &Url, id: i64) -> String {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("id", &id.to_string());
    url.into()
}

pub fn is_valid_id(id: i64) -> bool {
    (MIN_ID..=MAX_ID).contains(&id)
}
