// 📥 Batch ingestion - CSV rows → categorized transactions
//
// Every row goes through Categorizer::categorize_and_persist on its own.
// A failing row is recorded (1-based row number, raw merchant, message) and
// never aborts the rest of the batch. Only a structurally unreadable stream
// (no header, missing required column, I/O failure) is an error for the
// whole upload.

use crate::config::CategorizerConfig;
use crate::error::{CategorizationError, IngestError};
use crate::orchestrator::{Categorizer, NewTransaction};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Accepted date layouts, tried in order; first successful parse wins
pub const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];

// ============================================================================
// ROW + SUMMARY TYPES
// ============================================================================

/// One data row exactly as read from the upload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRow {
    pub merchant: String,
    pub amount: String,
    pub currency: Option<String>,
    pub date: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub merchant_name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_records: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Ordered by row number
    pub errors: Vec<RowError>,
}

// ============================================================================
// FIELD PARSING
// ============================================================================

pub fn parse_date(value: &str) -> Result<NaiveDate, CategorizationError> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| CategorizationError::validation(format!("Unable to parse date: {}", value)))
}

pub fn parse_amount(value: &str) -> Result<Decimal, CategorizationError> {
    let value = value.trim();
    Decimal::from_str(value)
        .map_err(|_| CategorizationError::validation(format!("Unable to parse amount: {}", value)))
}

// ============================================================================
// CSV READER
// ============================================================================

/// Read a header-led CSV stream into rows
///
/// Required columns: merchant, amount, date. Optional: currency, description.
/// Header names are matched case-insensitively. Short rows are kept (with
/// empty fields) so they fail individually during ingestion. Invalid UTF-8
/// in a data row is replaced with U+FFFD; only the header must be valid.
pub fn read_csv_rows<R: Read>(input: R) -> Result<Vec<BatchRow>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader.headers()?.clone();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(IngestError::MissingHeader);
    }

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let merchant_idx = column("merchant").ok_or(IngestError::MissingColumn("merchant"))?;
    let amount_idx = column("amount").ok_or(IngestError::MissingColumn("amount"))?;
    let date_idx = column("date").ok_or(IngestError::MissingColumn("date"))?;
    let currency_idx = column("currency");
    let description_idx = column("description");

    let mut rows = Vec::new();
    for result in reader.byte_records() {
        let record = result?;
        let field = |idx: usize| {
            record
                .get(idx)
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
                .unwrap_or_default()
        };
        let optional = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|raw| !raw.is_empty())
                .map(|raw| String::from_utf8_lossy(raw).into_owned())
        };

        rows.push(BatchRow {
            merchant: field(merchant_idx),
            amount: field(amount_idx),
            currency: optional(currency_idx),
            date: field(date_idx),
            description: optional(description_idx),
        });
    }

    Ok(rows)
}

// ============================================================================
// BATCH INGESTOR
// ============================================================================

pub struct BatchIngestor {
    categorizer: Arc<Categorizer>,
    default_currency: String,
    concurrency: usize,
}

impl BatchIngestor {
    pub fn new(categorizer: Arc<Categorizer>, config: &CategorizerConfig) -> Self {
        BatchIngestor {
            categorizer,
            default_currency: config.default_currency.clone(),
            concurrency: config.batch_concurrency.max(1),
        }
    }

    /// Parse a CSV upload and ingest every row
    pub async fn ingest_csv<R: Read>(&self, user_id: i64, input: R) -> Result<BatchSummary, IngestError> {
        let rows = read_csv_rows(input)?;
        Ok(self.ingest(user_id, rows).await)
    }

    /// Categorize and persist each row independently, at most `concurrency` at a time
    pub async fn ingest(&self, user_id: i64, rows: Vec<BatchRow>) -> BatchSummary {
        info!(user_id, rows = rows.len(), "Processing batch upload");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut pending: Vec<(usize, String, JoinHandle<Result<(), CategorizationError>>)> =
            Vec::with_capacity(rows.len());

        for (index, row) in rows.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned().await.ok();
            let categorizer = self.categorizer.clone();
            let default_currency = self.default_currency.clone();
            let merchant = row.merchant.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let request = build_request(user_id, row, &default_currency)?;
                categorizer.categorize_and_persist(request).await.map(|_| ())
            });
            pending.push((index + 1, merchant, handle));
        }

        let total_records = pending.len();
        let mut errors = Vec::new();

        for (row_number, merchant_name, handle) in pending {
            let error = match handle.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(join_error) => format!("Row processing aborted: {}", join_error),
            };

            warn!(row_number, error = %error, "Error processing row");
            errors.push(RowError {
                row_number,
                merchant_name,
                error,
            });
        }

        let summary = BatchSummary {
            total_records,
            success_count: total_records - errors.len(),
            failure_count: errors.len(),
            errors,
        };

        info!(
            user_id,
            total = summary.total_records,
            succeeded = summary.success_count,
            failed = summary.failure_count,
            "Batch upload complete"
        );
        summary
    }
}

fn build_request(
    user_id: i64,
    row: BatchRow,
    default_currency: &str,
) -> Result<NewTransaction, CategorizationError> {
    let amount = parse_amount(&row.amount)?;
    let transaction_date = parse_date(&row.date)?;
    let currency = row
        .currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| default_currency.to_string());

    Ok(NewTransaction {
        user_id,
        merchant_name: row.merchant,
        amount,
        currency,
        transaction_date,
        description: row.description,
    })
}

// ============================================================================
// TESTS
// ============================================================================
