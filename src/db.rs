use crate::cache::KeyValueStore;
use crate::error::{CacheError, StorageError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// Date format used for the transaction_date column (sorts lexicographically)
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Categorized transaction with extensible metadata
/// Only category_id / confidence_score / is_user_corrected change after insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned identity (0 until persisted)
    pub id: i64,

    pub user_id: i64,

    /// Merchant exactly as supplied
    pub merchant_name: String,

    /// Canonical form used as cache/classifier key
    pub merchant_normalized: String,

    /// Fixed-point amount, scale 2
    pub amount: Decimal,

    /// ISO 4217 code, upper case
    pub currency: String,

    pub transaction_date: NaiveDate,

    /// None until categorized
    pub category_id: Option<i64>,

    /// 0.0 - 1.0; 1.0 for cache hits
    pub confidence_score: f64,

    /// true => category_id is a human decision and outranks any model output
    pub is_user_corrected: bool,

    // ========================================================================
    // EXTENSIBLE METADATA (description, category_source, correction_note...)
    // ========================================================================
    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Get metadata value by key
    pub fn get_metadata(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    pub fn set_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.metadata.insert(key.to_string(), value);
    }

    /// Free-form description supplied at creation, if any
    pub fn description(&self) -> Option<&str> {
        self.get_metadata("description").and_then(|v| v.as_str())
    }
}

/// Training-data row written whenever a user overrides a category
/// Append-only; is_processed is flipped only by the offline retraining job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRecord {
    /// Store-assigned identity (0 until persisted)
    pub id: i64,
    pub transaction_id: i64,
    pub original_category_id: Option<i64>,
    pub corrected_category_id: i64,
    pub user_id: i64,
    pub correction_date: DateTime<Utc>,
    pub is_processed: bool,
}

impl CorrectionRecord {
    pub fn new(
        transaction_id: i64,
        original_category_id: Option<i64>,
        corrected_category_id: i64,
        user_id: i64,
    ) -> Self {
        CorrectionRecord {
            id: 0,
            transaction_id,
            original_category_id,
            corrected_category_id,
            user_id,
            correction_date: Utc::now(),
            is_processed: false,
        }
    }
}

/// Optional filters for listing a user's transactions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub category_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// ============================================================================
// STORE CAPABILITIES
// ============================================================================

/// Durable storage for transactions; every write is a single atomic statement
pub trait TransactionStore: Send + Sync {
    /// Insert and return the transaction with its assigned id
    fn insert_transaction(&self, tx: Transaction) -> Result<Transaction, StorageError>;

    fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, StorageError>;

    /// Persist category_id, confidence_score, is_user_corrected, metadata, updated_at
    fn update_category(&self, tx: &Transaction) -> Result<(), StorageError>;

    /// Category ids of the user's `limit` latest transactions (by date, newest first),
    /// uncategorized ones skipped
    fn recent_category_ids(&self, user_id: i64, limit: usize) -> Result<Vec<i64>, StorageError>;

    fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StorageError>;
}

/// Sink for correction records consumed by offline retraining
pub trait CorrectionSink: Send + Sync {
    fn insert_correction(&self, record: &CorrectionRecord) -> Result<i64, StorageError>;

    fn unprocessed_corrections(&self, limit: usize) -> Result<Vec<CorrectionRecord>, StorageError>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// SQLite-backed store shared across request tasks
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        info!(path = %path.display(), "Opened transaction database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    pub fn count_transactions(&self) -> Result<i64, StorageError> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<(), StorageError> {
    // Enable WAL mode for crash recovery (in-memory databases report "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            merchant_name TEXT NOT NULL,
            merchant_normalized TEXT NOT NULL,
            amount TEXT NOT NULL,
            currency TEXT NOT NULL CHECK (length(currency) = 3),
            transaction_date TEXT NOT NULL,
            category_id INTEGER,
            confidence_score REAL NOT NULL,
            is_user_corrected INTEGER NOT NULL DEFAULT 0,
            metadata TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // Correction log for retraining (consumed offline)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS model_training_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id INTEGER NOT NULL,
            original_category_id INTEGER,
            corrected_category_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            correction_date TEXT NOT NULL,
            is_processed INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Merchant cache shared by every process opening this database
    conn.execute(
        "CREATE TABLE IF NOT EXISTS merchant_cache (
            cache_key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            expires_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_user_date ON transactions(user_id, transaction_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_merchant_normalized ON transactions(merchant_normalized)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_training_unprocessed ON model_training_data(is_processed)",
        [],
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str = "transaction_id, user_id, merchant_name, merchant_normalized,
    amount, currency, transaction_date, category_id, confidence_score,
    is_user_corrected, metadata, created_at, updated_at";

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, format!("bad timestamp '{}': {}", value, e)))
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount_str: String = row.get(4)?;
    let date_str: String = row.get(6)?;
    let metadata_json: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(11)?;
    let updated_at_str: String = row.get(12)?;

    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| conversion_error(4, format!("bad amount '{}': {}", amount_str, e)))?;
    let transaction_date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
        .map_err(|e| conversion_error(6, format!("bad date '{}': {}", date_str, e)))?;
    let metadata = match metadata_json {
        Some(json_str) => serde_json::from_str(&json_str)
            .map_err(|e| conversion_error(10, format!("bad metadata: {}", e)))?,
        None => HashMap::new(),
    };

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        merchant_name: row.get(2)?,
        merchant_normalized: row.get(3)?,
        amount,
        currency: row.get(5)?,
        transaction_date,
        category_id: row.get(7)?,
        confidence_score: row.get(8)?,
        is_user_corrected: row.get(9)?,
        metadata,
        created_at: parse_timestamp(11, &created_at_str)?,
        updated_at: parse_timestamp(12, &updated_at_str)?,
    })
}

fn row_to_correction(row: &Row<'_>) -> rusqlite::Result<CorrectionRecord> {
    let correction_date_str: String = row.get(5)?;

    Ok(CorrectionRecord {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        original_category_id: row.get(2)?,
        corrected_category_id: row.get(3)?,
        user_id: row.get(4)?,
        correction_date: parse_timestamp(5, &correction_date_str)?,
        is_processed: row.get(6)?,
    })
}

impl TransactionStore for SqliteStore {
    fn insert_transaction(&self, mut tx: Transaction) -> Result<Transaction, StorageError> {
        let metadata_json = serde_json::to_string(&tx.metadata)?;
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO transactions (
                user_id, merchant_name, merchant_normalized, amount, currency,
                transaction_date, category_id, confidence_score, is_user_corrected,
                metadata, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                tx.user_id,
                tx.merchant_name,
                tx.merchant_normalized,
                tx.amount.to_string(),
                tx.currency,
                tx.transaction_date.format(DATE_FORMAT).to_string(),
                tx.category_id,
                tx.confidence_score,
                tx.is_user_corrected,
                metadata_json,
                tx.created_at.to_rfc3339(),
                tx.updated_at.to_rfc3339(),
            ],
        )?;

        tx.id = conn.last_insert_rowid();
        debug!(transaction_id = tx.id, user_id = tx.user_id, "Inserted transaction");
        Ok(tx)
    }

    fn get_transaction(&self, id: i64) -> Result<Option<Transaction>, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE transaction_id = ?1",
            TRANSACTION_COLUMNS
        );

        let tx = conn
            .query_row(&sql, params![id], row_to_transaction)
            .optional()?;
        Ok(tx)
    }

    fn update_category(&self, tx: &Transaction) -> Result<(), StorageError> {
        let metadata_json = serde_json::to_string(&tx.metadata)?;
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE transactions
             SET category_id = ?1,
                 confidence_score = ?2,
                 is_user_corrected = ?3,
                 metadata = ?4,
                 updated_at = ?5
             WHERE transaction_id = ?6",
            params![
                tx.category_id,
                tx.confidence_score,
                tx.is_user_corrected,
                metadata_json,
                tx.updated_at.to_rfc3339(),
                tx.id,
            ],
        )?;

        if changed != 1 {
            return Err(StorageError::CorruptRow {
                table: "transactions",
                detail: format!("update of transaction {} touched {} rows", tx.id, changed),
            });
        }
        Ok(())
    }

    fn recent_category_ids(&self, user_id: i64, limit: usize) -> Result<Vec<i64>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT category_id FROM transactions
             WHERE user_id = ?1
             ORDER BY transaction_date DESC, transaction_id DESC
             LIMIT ?2",
        )?;

        let ids = stmt
            .query_map(params![user_id, limit as i64], |row| row.get::<_, Option<i64>>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ids.into_iter().flatten().collect())
    }

    fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StorageError> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM transactions
             WHERE user_id = ?1
               AND (?2 IS NULL OR category_id = ?2)
               AND (?3 IS NULL OR transaction_date >= ?3)
               AND (?4 IS NULL OR transaction_date <= ?4)
             ORDER BY transaction_date DESC, transaction_id DESC
             LIMIT ?5 OFFSET ?6",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        let transactions = stmt
            .query_map(
                params![
                    user_id,
                    filter.category_id,
                    filter.start_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    filter.end_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    filter.limit.map(|l| l as i64).unwrap_or(-1),
                    filter.offset.unwrap_or(0) as i64,
                ],
                row_to_transaction,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

impl CorrectionSink for SqliteStore {
    fn insert_correction(&self, record: &CorrectionRecord) -> Result<i64, StorageError> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO model_training_data (
                transaction_id, original_category_id, corrected_category_id,
                user_id, correction_date, is_processed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.transaction_id,
                record.original_category_id,
                record.corrected_category_id,
                record.user_id,
                record.correction_date.to_rfc3339(),
                record.is_processed,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn unprocessed_corrections(&self, limit: usize) -> Result<Vec<CorrectionRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, transaction_id, original_category_id, corrected_category_id,
                    user_id, correction_date, is_processed
             FROM model_training_data
             WHERE is_processed = 0
             ORDER BY id ASC
             LIMIT ?1",
        )?;

        let records = stmt
            .query_map(params![limit as i64], row_to_correction)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }
}

// ============================================================================
// MERCHANT CACHE TABLE
// ============================================================================

fn cache_unavailable(e: impl std::fmt::Display) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

/// Expiry as unix milliseconds; a zero TTL expires immediately
fn expires_at_millis(ttl: Duration) -> i64 {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    Utc::now().timestamp_millis().saturating_add(ttl_ms)
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let conn = self.lock().map_err(cache_unavailable)?;

        let value = conn
            .query_row(
                "SELECT value FROM merchant_cache WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, Utc::now().timestamp_millis()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(cache_unavailable)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let conn = self.lock().map_err(cache_unavailable)?;

        conn.execute(
            "DELETE FROM merchant_cache WHERE expires_at <= ?1",
            params![Utc::now().timestamp_millis()],
        )
        .map_err(cache_unavailable)?;
        conn.execute(
            "INSERT INTO merchant_cache (cache_key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at_millis(ttl)],
        )
        .map_err(cache_unavailable)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.lock().map_err(cache_unavailable)?;

        conn.execute("DELETE FROM merchant_cache WHERE cache_key = ?1", params![key])
            .map_err(cache_unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Helper function to create test transactions with all required fields
    fn create_test_transaction(
        user_id: i64,
        merchant: &str,
        amount: &str,
        date: &str,
        category_id: Option<i64>,
    ) -> Transaction {
        let now = Utc::now();
        Transaction {
            id: 0,
            user_id,
            merchant_name: merchant.to_string(),
            merchant_normalized: merchant.to_lowercase(),
            amount: Decimal::from_str(amount).unwrap(),
            currency: "INR".to_string(),
            transaction_date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            category_id,
            confidence_score: 0.9,
            is_user_corrected: false,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut tx = create_test_transaction(1, "Swiggy", "349.50", "2024-03-01", Some(1));
        tx.set_metadata("description", json!("dinner"));

        let inserted = store.insert_transaction(tx).unwrap();
        assert!(inserted.id > 0);

        let loaded = store.get_transaction(inserted.id).unwrap().unwrap();
        assert_eq!(loaded.amount.to_string(), "349.50");
        assert_eq!(loaded.description(), Some("dinner"));
        assert_eq!(loaded.category_id, Some(1));
        assert_eq!(loaded.created_at.timestamp(), inserted.created_at.timestamp());
    }

    #[test]
    fn test_get_missing_transaction_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_transaction(999).unwrap().is_none());
    }

    #[test]
    fn test_recent_category_ids_orders_by_date_and_limits() {
        let store = SqliteStore::open_in_memory().unwrap();

        let rows = [
            ("2024-01-01", Some(1)),
            ("2024-01-07", Some(7)),
            ("2024-01-03", Some(3)),
            ("2024-01-06", None),
            ("2024-01-05", Some(5)),
            ("2024-01-04", Some(4)),
            ("2024-01-02", Some(2)),
        ];
        for (date, category) in rows {
            store
                .insert_transaction(create_test_transaction(1, "m", "10.00", date, category))
                .unwrap();
        }
        // Another user's rows never leak into the context
        store
            .insert_transaction(create_test_transaction(2, "m", "10.00", "2024-02-01", Some(99)))
            .unwrap();

        let ids = store.recent_category_ids(1, 5).unwrap();

        // Top five by date are 7, (uncategorized), 5, 4, 3
        assert_eq!(ids, vec![7, 5, 4, 3]);
    }

    #[test]
    fn test_update_category_persists_correction_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = store
            .insert_transaction(create_test_transaction(1, "Amazon", "999.00", "2024-03-02", Some(4)))
            .unwrap();

        tx.category_id = Some(9);
        tx.is_user_corrected = true;
        tx.set_metadata("correction_note", json!("gift"));
        store.update_category(&tx).unwrap();

        let loaded = store.get_transaction(tx.id).unwrap().unwrap();
        assert_eq!(loaded.category_id, Some(9));
        assert!(loaded.is_user_corrected);
        assert_eq!(loaded.get_metadata("correction_note"), Some(&json!("gift")));
    }

    #[test]
    fn test_update_of_unknown_transaction_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = create_test_transaction(1, "Amazon", "999.00", "2024-03-02", Some(4));
        tx.id = 42;

        assert!(store.update_category(&tx).is_err());
    }

    #[test]
    fn test_list_transactions_applies_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        for (date, category) in [
            ("2024-01-10", Some(1)),
            ("2024-01-20", Some(2)),
            ("2024-02-05", Some(1)),
            ("2024-03-01", Some(1)),
        ] {
            store
                .insert_transaction(create_test_transaction(1, "m", "5.00", date, category))
                .unwrap();
        }

        let all = store.list_transactions(1, &TransactionFilter::default()).unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].transaction_date.to_string(), "2024-03-01");

        let filter = TransactionFilter {
            category_id: Some(1),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 15),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 28),
            ..TransactionFilter::default()
        };
        let filtered = store.list_transactions(1, &filter).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].transaction_date.to_string(), "2024-02-05");

        let page = TransactionFilter {
            limit: Some(2),
            offset: Some(1),
            ..TransactionFilter::default()
        };
        let paged = store.list_transactions(1, &page).unwrap();
        assert_eq!(paged.len(), 2);
        assert_eq!(paged[0].transaction_date.to_string(), "2024-02-05");
    }

    #[test]
    fn test_corrections_are_appended_unprocessed() {
        let store = SqliteStore::open_in_memory().unwrap();

        let first = store
            .insert_correction(&CorrectionRecord::new(10, Some(15), 1, 7))
            .unwrap();
        let second = store
            .insert_correction(&CorrectionRecord::new(11, None, 3, 7))
            .unwrap();
        assert!(second > first);

        let pending = store.unprocessed_corrections(10).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].transaction_id, 10);
        assert_eq!(pending[0].original_category_id, Some(15));
        assert_eq!(pending[1].original_category_id, None);
        assert!(pending.iter().all(|r| !r.is_processed));
    }

    #[test]
    fn test_currency_must_be_three_chars() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut tx = create_test_transaction(1, "m", "1.00", "2024-01-01", None);
        tx.currency = "RUPEE".to_string();

        assert!(matches!(
            store.insert_transaction(tx),
            Err(StorageError::Database(_))
        ));
    }

    #[tokio::test]
    async fn test_merchant_cache_table_set_get_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.get("merchant:swiggy").await.unwrap(), None);

        store.set("merchant:swiggy", b"1".to_vec(), ttl).await.unwrap();
        store.set("merchant:swiggy", b"7".to_vec(), ttl).await.unwrap();
        assert_eq!(store.get("merchant:swiggy").await.unwrap(), Some(b"7".to_vec()));

        store.delete("merchant:swiggy").await.unwrap();
        assert_eq!(store.get("merchant:swiggy").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_merchant_cache_table_honours_ttl() {
        let store = SqliteStore::open_in_memory().unwrap();

        store.set("merchant:uber", b"3".to_vec(), Duration::ZERO).await.unwrap();
        assert_eq!(store.get("merchant:uber").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_merchant_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categorizer.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .set("merchant:netflix", b"12".to_vec(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("merchant:netflix").await.unwrap(),
            Some(b"12".to_vec())
        );
    }
}
