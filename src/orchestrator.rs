// 🧭 Categorization orchestrator
// Per transaction: normalize → cache → (miss) classifier with recent-history
// context → persist → cache confident classifier results.
// Per correction: ownership check → persist → best-effort training record →
// unconditional cache overwrite.

use crate::cache::{ConfidenceGatedCache, KeyValueStore};
use crate::classifier::{ClassificationRequest, Classifier, HttpClassifier};
use crate::config::CategorizerConfig;
use crate::db::{CorrectionSink, SqliteStore, Transaction, TransactionFilter, TransactionStore};
use crate::error::CategorizationError;
use crate::normalizer::normalize_merchant;
use crate::recorder::{CorrectionRecorder, RecordOutcome};
use anyhow::Context as AnyhowContext;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence assigned to categories served from the cache
pub const CACHE_HIT_CONFIDENCE: f64 = 1.0;

/// Incoming transaction before categorization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: i64,
    pub merchant_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub transaction_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
}

/// Where a transaction's category came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategorySource {
    Cache,
    Classifier,
}

impl CategorySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategorySource::Cache => "cache",
            CategorySource::Classifier => "classifier",
        }
    }
}

pub struct Categorizer {
    store: Arc<dyn TransactionStore>,
    cache: ConfidenceGatedCache,
    classifier: Arc<dyn Classifier>,
    recorder: CorrectionRecorder,
    recent_context_size: usize,
}

impl Categorizer {
    pub fn new(
        config: &CategorizerConfig,
        store: Arc<dyn TransactionStore>,
        kv_store: Arc<dyn KeyValueStore>,
        classifier: Arc<dyn Classifier>,
        corrections: Arc<dyn CorrectionSink>,
    ) -> Self {
        Categorizer {
            store,
            cache: ConfidenceGatedCache::new(kv_store, config),
            classifier,
            recorder: CorrectionRecorder::new(corrections),
            recent_context_size: config.recent_context_size,
        }
    }

    /// Production wiring: SQLite at `database_path` (transactions, corrections and
    /// the merchant cache table), HTTP classifier
    pub fn open(config: &CategorizerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(
            SqliteStore::open(&config.database_path)
                .with_context(|| format!("Failed to open database {:?}", config.database_path))?,
        );
        let classifier =
            Arc::new(HttpClassifier::new(config).context("Failed to build classifier client")?);

        Ok(Self::new(
            config,
            store.clone(),
            store.clone(),
            classifier,
            store,
        ))
    }

    pub fn cache(&self) -> &ConfidenceGatedCache {
        &self.cache
    }

    // ========================================================================
    // CATEGORIZATION
    // ========================================================================

    pub async fn categorize_and_persist(
        &self,
        request: NewTransaction,
    ) -> Result<Transaction, CategorizationError> {
        let (amount, currency) = validate_money(request.amount, &request.currency)?;

        let merchant_name = request.merchant_name.trim();
        if merchant_name.is_empty() {
            return Err(CategorizationError::validation("merchant name is empty"));
        }
        let normalized = normalize_merchant(merchant_name);
        if normalized.is_empty() {
            return Err(CategorizationError::validation(format!(
                "merchant name '{}' has no alphanumeric characters",
                merchant_name
            )));
        }

        info!(user_id = request.user_id, merchant = %normalized, "Categorizing transaction");

        let (category_id, confidence, source) = match self.cache.lookup(&normalized).await {
            Some(category_id) => (category_id, CACHE_HIT_CONFIDENCE, CategorySource::Cache),
            None => {
                let recent_category_ids = self
                    .store
                    .recent_category_ids(request.user_id, self.recent_context_size)?;

                let result = self
                    .classifier
                    .classify(&ClassificationRequest {
                        merchant_normalized: normalized.clone(),
                        amount,
                        currency: currency.clone(),
                        recent_category_ids,
                    })
                    .await;

                (result.category_id, result.confidence_score, CategorySource::Classifier)
            }
        };

        let mut metadata = HashMap::new();
        if let Some(description) = request.description.as_deref().filter(|d| !d.is_empty()) {
            metadata.insert("description".to_string(), json!(description));
        }
        metadata.insert("category_source".to_string(), json!(source.as_str()));

        let now = Utc::now();
        let transaction = self.store.insert_transaction(Transaction {
            id: 0,
            user_id: request.user_id,
            merchant_name: request.merchant_name.clone(),
            merchant_normalized: normalized.clone(),
            amount,
            currency,
            transaction_date: request.transaction_date,
            category_id: Some(category_id),
            confidence_score: confidence,
            is_user_corrected: false,
            metadata,
            created_at: now,
            updated_at: now,
        })?;

        if source == CategorySource::Classifier {
            self.cache.put(&normalized, category_id, confidence).await;
        }

        debug!(
            transaction_id = transaction.id,
            category_id,
            confidence,
            source = source.as_str(),
            "Transaction categorized"
        );
        Ok(transaction)
    }

    // ========================================================================
    // USER CORRECTIONS
    // ========================================================================

    pub async fn apply_user_correction(
        &self,
        transaction_id: i64,
        user_id: i64,
        new_category_id: i64,
    ) -> Result<Transaction, CategorizationError> {
        self.apply_user_correction_with_note(transaction_id, user_id, new_category_id, None)
            .await
    }

    /// Correction with an optional free-text note kept in metadata
    pub async fn apply_user_correction_with_note(
        &self,
        transaction_id: i64,
        user_id: i64,
        new_category_id: i64,
        note: Option<&str>,
    ) -> Result<Transaction, CategorizationError> {
        let mut transaction = self
            .store
            .get_transaction(transaction_id)?
            .ok_or(CategorizationError::NotFound(transaction_id))?;

        if transaction.user_id != user_id {
            warn!(transaction_id, user_id, "Rejected correction from non-owner");
            return Err(CategorizationError::Unauthorized {
                transaction_id,
                user_id,
            });
        }

        if new_category_id <= 0 {
            return Err(CategorizationError::validation(format!(
                "invalid category id {}",
                new_category_id
            )));
        }

        let original_category_id = transaction.category_id;
        transaction.category_id = Some(new_category_id);
        transaction.is_user_corrected = true;
        transaction.updated_at = Utc::now();
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            transaction.set_metadata("correction_note", json!(note));
        }
        self.store.update_category(&transaction)?;

        if let RecordOutcome::Dropped(reason) = self.recorder.record(
            transaction_id,
            original_category_id,
            new_category_id,
            user_id,
        ) {
            warn!(transaction_id, %reason, "Correction applied without training record");
        }

        self.cache
            .overwrite(&transaction.merchant_normalized, new_category_id)
            .await;

        info!(
            transaction_id,
            from = ?original_category_id,
            to = new_category_id,
            "Updated transaction category"
        );
        Ok(transaction)
    }

    pub fn list_transactions(
        &self,
        user_id: i64,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, CategorizationError> {
        Ok(self.store.list_transactions(user_id, filter)?)
    }
}

/// Positive amount with at most two decimals, 3-letter currency
fn validate_money(amount: Decimal, currency: &str) -> Result<(Decimal, String), CategorizationError> {
    if amount <= Decimal::ZERO {
        return Err(CategorizationError::validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(CategorizationError::validation(format!(
            "amount {} has more than two decimal places",
            amount
        )));
    }

    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CategorizationError::validation(format!(
            "invalid currency code '{}'",
            currency
        )));
    }

    let mut amount = amount;
    amount.rescale(2);
    Ok((amount, currency.to_ascii_uppercase()))
}

// ============================================================================
// TESTS
// ============================================================================
