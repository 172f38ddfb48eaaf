// Merchant Categorizer - Core Library
// Exposes the categorization pipeline for the CLI, the API server, and tests

pub mod cache;        // Confidence-gated merchant → category cache
pub mod classifier;   // Bounded-latency oracle client with fallback
pub mod config;
pub mod db;           // SQLite transaction + correction storage
pub mod error;
pub mod ingest;       // CSV batch ingestion with per-row isolation
pub mod normalizer;
pub mod orchestrator; // Categorize-and-persist + user corrections
pub mod recorder;     // Best-effort correction log

// Re-export commonly used types
pub use cache::{ConfidenceGatedCache, KeyValueStore, MemoryStore, MERCHANT_CACHE_PREFIX};
pub use classifier::{
    AlternativeCategory, ClassificationRequest, ClassificationResult, Classifier, HttpClassifier,
};
pub use config::CategorizerConfig;
pub use db::{
    setup_database, CorrectionRecord, CorrectionSink, SqliteStore, Transaction,
    TransactionFilter, TransactionStore,
};
pub use error::{CacheError, CategorizationError, ClassifierError, IngestError, StorageError};
pub use ingest::{parse_date, read_csv_rows, BatchIngestor, BatchRow, BatchSummary, RowError};
pub use normalizer::normalize_merchant;
pub use orchestrator::{CategorySource, Categorizer, NewTransaction};
pub use recorder::{CorrectionRecorder, RecordOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the fmt subscriber used by both binaries (RUST_LOG overrides `info`)
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
