//! xlsx-enrich: fills Title/Body columns of an ID sheet from the
//! article API, saving the workbook after every row.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod sheet;
mod test;

pub use api::{Article, ArticleClient, ArticleSource, FailureKind, RowOutcome, SkipReason};
pub use config::Config;
pub use error::{EnrichError, Result};
pub use pipeline::{RowResult, process_rows, run};
pub use report::{ErrorEntry, Report};
pub use sheet::{Columns, EnrichSheet, IdRow};
