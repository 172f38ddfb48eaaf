// 📝 Correction recorder
// Best-effort side channel feeding retraining data. A failure here is
// reported through RecordOutcome and logged; it never fails the correction.

use crate::db::{CorrectionRecord, CorrectionSink};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Stored with the given record id
    Recorded(i64),

    /// Sink unavailable; the record was not stored
    Dropped(String),
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded(_))
    }
}

pub struct CorrectionRecorder {
    sink: Arc<dyn CorrectionSink>,
}

impl CorrectionRecorder {
    pub fn new(sink: Arc<dyn CorrectionSink>) -> Self {
        CorrectionRecorder { sink }
    }

    pub fn record(
        &self,
        transaction_id: i64,
        original_category_id: Option<i64>,
        corrected_category_id: i64,
        user_id: i64,
    ) -> RecordOutcome {
        let record = CorrectionRecord::new(
            transaction_id,
            original_category_id,
            corrected_category_id,
            user_id,
        );

        match self.sink.insert_correction(&record) {
            Ok(id) => {
                info!(transaction_id, record_id = id, "Recorded user correction");
                RecordOutcome::Recorded(id)
            }
            Err(e) => {
                warn!(transaction_id, error = %e, "Failed to record user correction");
                RecordOutcome::Dropped(e.to_string())
            }
        }
    }
}
