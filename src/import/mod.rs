//! Bulk Imports
//!
//! Turns operator-supplied files into backend records:
//! - proxy CSV (`host,port,username,password,proxy_type`)
//! - account CSV (`phone_number,session_name,notes`)
//! - post lists (one Telegram link per line)

mod accounts;
mod posts;
mod proxies;

pub use accounts::{import_accounts, AccountCsvImporter};
pub use posts::{import_posts, parse_post_list};
pub use proxies::{import_proxies, ProxyCsvImporter};

use crate::api::ApiError;

/// Rows parsed from a file, with the problems found along the way
#[derive(Debug)]
pub struct ParsedRows<T> {
    pub rows: Vec<T>,
    pub rows_skipped: usize,
    pub errors: Vec<String>,
}

/// Outcome of creating one imported record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Success,
    /// The record already existed on the backend
    Skipped,
    Error,
}

#[derive(Debug, Clone)]
pub struct ImportItem {
    pub name: String,
    pub status: ImportStatus,
    pub message: String,
}

pub fn count_status(items: &[ImportItem], status: ImportStatus) -> usize {
    items.iter().filter(|i| i.status == status).count()
}

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("{0}")]
    NoValidRows(String),

    #[error("{0}")]
    Invalid(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{}", .0.detail())]
    Api(#[from] ApiError),
}

const MAX_ERRORS: usize = 100;

/// Cap the error list so one broken file cannot flood the output
fn truncate_errors(errors: &mut Vec<String>) {
    if errors.len() > MAX_ERRORS {
        let total = errors.len();
        errors.truncate(MAX_ERRORS);
        errors.push(format!("... and {} more errors", total - MAX_ERRORS));
    }
}

/// Index of each lowercased header
fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
}

fn field<'r>(record: &'r csv::StringRecord, index: Option<usize>) -> Option<&'r str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
