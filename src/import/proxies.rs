//! Proxy CSV import

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use super::{field, header_index, truncate_errors, ImportError, ImportItem, ImportStatus, ParsedRows};
use crate::api::dto::NewProxy;
use crate::services::ProxiesService;

/// Proxy CSV reader with a configurable default type
pub struct ProxyCsvImporter {
    default_type: String,
    active: bool,
}

impl Default for ProxyCsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyCsvImporter {
    pub fn new() -> Self {
        Self {
            default_type: "socks5".to_string(),
            active: true,
        }
    }

    /// Type used for rows without a `proxy_type` column
    pub fn with_default_type(mut self, proxy_type: &str) -> Self {
        self.default_type = proxy_type.to_string();
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedRows<NewProxy>, ImportError> {
        let file = std::fs::File::open(path)?;
        self.parse_reader(file)
    }

    pub fn parse_str(&self, csv_data: &str) -> Result<ParsedRows<NewProxy>, ImportError> {
        self.parse_reader(csv_data.as_bytes())
    }

    fn parse_reader<R: Read>(&self, input: R) -> Result<ParsedRows<NewProxy>, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let host_col = header_index(&headers, "host");
        let port_col = header_index(&headers, "port");
        let user_col = header_index(&headers, "username");
        let pass_col = header_index(&headers, "password");
        let type_col = header_index(&headers, "proxy_type");

        let mut rows = Vec::new();
        let mut errors = Vec::new();
        let mut rows_skipped = 0;
        let mut names = HashSet::new();

        for (line_num, result) in reader.records().enumerate() {
            let line = line_num + 2;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(format!("Line {}: {}", line, e));
                    rows_skipped += 1;
                    continue;
                }
            };

            let (Some(host), Some(port)) = (field(&record, host_col), field(&record, port_col))
            else {
                rows_skipped += 1;
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                errors.push(format!("Line {}: invalid port '{}'", line, port));
                rows_skipped += 1;
                continue;
            };

            let proxy_name = unique_name(&base_name(host, port), &mut names);
            rows.push(NewProxy {
                proxy_name,
                proxy_type: field(&record, type_col)
                    .unwrap_or(self.default_type.as_str())
                    .to_string(),
                host: host.to_string(),
                port,
                username: field(&record, user_col).map(str::to_string),
                password: field(&record, pass_col).map(str::to_string),
                is_active: Some(self.active),
                notes: None,
            });
        }

        if rows.is_empty() {
            return Err(ImportError::NoValidRows(
                "No valid proxy data found in CSV".to_string(),
            ));
        }

        truncate_errors(&mut errors);
        Ok(ParsedRows {
            rows,
            rows_skipped,
            errors,
        })
    }
}

/// `proxy_<last two host parts>_<port>`, e.g. `proxy_217_82_1080`
fn base_name(host: &str, port: u16) -> String {
    let parts: Vec<&str> = host.split('.').collect();
    let short = parts[parts.len().saturating_sub(2)..].join("_");
    format!("proxy_{}_{}", short, port)
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut counter = 1;
    while taken.contains(&name) {
        name = format!("{}_{}", base, counter);
        counter += 1;
    }
    taken.insert(name.clone());
    name
}

/// Create each proxy through the per-item endpoint; existing names are
/// reported as skipped
pub async fn import_proxies(
    service: &ProxiesService,
    proxies: Vec<NewProxy>,
    concurrency: usize,
) -> Vec<ImportItem> {
    let report = service.create_many(proxies, concurrency).await;

    let items: Vec<ImportItem> = report
        .items
        .into_iter()
        .map(|item| match item.outcome {
            Ok(_) => ImportItem {
                name: item.key,
                status: ImportStatus::Success,
                message: "Proxy created successfully".to_string(),
            },
            Err(e) => {
                let message = e.detail();
                let status = if message.contains("already exists") {
                    ImportStatus::Skipped
                } else {
                    ImportStatus::Error
                };
                ImportItem {
                    name: item.key,
                    status,
                    message,
                }
            }
        })
        .collect();

    tracing::info!(
        total = items.len(),
        created = super::count_status(&items, ImportStatus::Success),
        skipped = super::count_status(&items, ImportStatus::Skipped),
        "Proxy CSV import finished"
    );
    items
}
