//! Account CSV import

use std::io::Read;
use std::path::Path;

use super::{field, header_index, truncate_errors, ImportError, ParsedRows};
use crate::api::dto::{Account, BulkResponse};
use crate::services::accounts::normalize_phone;
use crate::services::AccountsService;

#[derive(Debug, Default)]
pub struct AccountCsvImporter;

impl AccountCsvImporter {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParsedRows<Account>, ImportError> {
        let file = std::fs::File::open(path)?;
        self.parse_reader(file)
    }

    pub fn parse_str(&self, csv_data: &str) -> Result<ParsedRows<Account>, ImportError> {
        self.parse_reader(csv_data.as_bytes())
    }

    fn parse_reader<R: Read>(&self, input: R) -> Result<ParsedRows<Account>, ImportError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers = reader.headers()?.clone();
        let Some(phone_col) = header_index(&headers, "phone_number") else {
            return Err(ImportError::Invalid(
                "CSV must have a phone_number column".to_string(),
            ));
        };
        let session_col = header_index(&headers, "session_name");
        let notes_col = header_index(&headers, "notes");

        let mut rows: Vec<Account> = Vec::new();
        let mut errors = Vec::new();
        let mut rows_skipped = 0;

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

            let Some(phone_number) = field(&record, Some(phone_col)).and_then(normalize_phone)
            else {
                errors.push(format!("Line {}: missing phone number", line));
                rows_skipped += 1;
                continue;
            };
            if rows.iter().any(|a| a.phone_number == phone_number) {
                errors.push(format!("Line {}: duplicate phone number {}", line, phone_number));
                rows_skipped += 1;
                continue;
            }

            rows.push(Account {
                phone_number,
                session_name: field(&record, session_col).map(str::to_string),
                notes: field(&record, notes_col).map(str::to_string),
                ..Default::default()
            });
        }

        if rows.is_empty() {
            return Err(ImportError::NoValidRows(
                "No valid account data found in CSV".to_string(),
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

/// Send parsed accounts through the bulk create endpoint
pub async fn import_accounts(
    service: &AccountsService,
    accounts: &[Account],
) -> Result<BulkResponse, ImportError> {
    let response = service.bulk_create(accounts).await?;
    tracing::info!(
        total = accounts.len(),
        created = response.results.iter().filter(|r| r.is_success()).count(),
        "Account import finished"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use serde_json::json;

    #[test]
    fn test_parse_normalizes_phones() {
        let csv_data = "Phone_Number,session_name,notes
+1 (555) 010-0001,main,
15550100002,,backup
,orphan,
1-555-010-0001,dup,";

        let parsed = AccountCsvImporter::new().parse_str(csv_data).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].phone_number, "+15550100001");
        assert_eq!(parsed.rows[0].session_name.as_deref(), Some("main"));
        assert_eq!(parsed.rows[0].notes, None);
        assert_eq!(parsed.rows[1].phone_number, "+15550100002");
        assert_eq!(parsed.rows[1].notes.as_deref(), Some("backup"));
        assert_eq!(parsed.rows_skipped, 2);
        assert_eq!(parsed.errors[0], "Line 4: missing phone number");
    }

    #[test]
    fn test_requires_phone_column() {
        let err = AccountCsvImporter::new()
            .parse_str("phone,notes\n+1555,x")
            .unwrap_err();
        assert!(matches!(err, ImportError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_import_uses_bulk_endpoint() {
        let mock = MockBackend::start().await;
        mock.respond(
            "POST",
            "/accounts/bulk",
            200,
            json!({"message": "ok", "results": [{"status": "success", "phone_number": "+15550100001"}]}),
        );
        let service = AccountsService::new(mock.client());

        let parsed = AccountCsvImporter::new()
            .parse_str("phone_number\n+1 555 010 0001")
            .unwrap();
        let response = import_accounts(&service, &parsed.rows).await.unwrap();
        assert_eq!(response.results.len(), 1);

        let body = mock.requests_to("POST", "/accounts/bulk")[0].json();
        assert_eq!(body, json!([{"phone_number": "+15550100001"}]));
    }
}
