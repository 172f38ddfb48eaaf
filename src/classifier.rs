// 🤖 Classifier client
// One bounded-latency call to the external categorization oracle per
// transaction. Any failure (timeout, transport, status, malformed body)
// becomes the configured fallback result so categorization never blocks or
// fails the transaction write path.

use crate::config::CategorizerConfig;
use crate::error::ClassifierError;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// WIRE TYPES
// ============================================================================

/// Request sent to the oracle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRequest {
    pub merchant_normalized: String,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub currency: String,

    /// Category ids of the user's most recent transactions, newest first
    pub recent_category_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeCategory {
    pub category_id: i64,

    #[serde(default)]
    pub category_name: String,

    #[serde(alias = "confidence")]
    pub score: f64,
}

/// Oracle answer; never persisted, only projected into a Transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category_id: i64,
    pub category_name: String,
    pub confidence_score: f64,

    #[serde(default)]
    pub alternatives: Vec<AlternativeCategory>,
}

impl ClassificationResult {
    /// Fixed result used whenever the oracle cannot answer
    pub fn fallback(config: &CategorizerConfig) -> Self {
        ClassificationResult {
            category_id: config.fallback_category_id,
            category_name: config.fallback_category_name.clone(),
            confidence_score: config.fallback_confidence,
            alternatives: Vec::new(),
        }
    }

    fn check(self) -> Result<Self, ClassifierError> {
        let in_range = |c: f64| (0.0..=1.0).contains(&c);

        if !in_range(self.confidence_score) {
            return Err(ClassifierError::Malformed(format!(
                "confidence_score {} outside [0, 1]",
                self.confidence_score
            )));
        }
        if let Some(alt) = self.alternatives.iter().find(|a| !in_range(a.score)) {
            return Err(ClassifierError::Malformed(format!(
                "alternative {} score {} outside [0, 1]",
                alt.category_id, alt.score
            )));
        }
        Ok(self)
    }
}

// ============================================================================
// CLASSIFIER CAPABILITY
// ============================================================================

/// Categorization oracle as seen by the pipeline: always answers
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult;
}

/// HTTP-backed classifier; its error branch is the production fallback
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    timeout: Duration,
    fallback: ClassificationResult,
}

impl HttpClassifier {
    pub fn new(config: &CategorizerConfig) -> Result<Self, ClassifierError> {
        let timeout = config.classifier_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(HttpClassifier {
            client,
            endpoint: format!("{}/categorize", config.classifier_url.trim_end_matches('/')),
            timeout,
            fallback: ClassificationResult::fallback(config),
        })
    }

    /// One attempt against the oracle, no retry
    async fn call(&self, request: &ClassificationRequest) -> Result<ClassificationResult, ClassifierError> {
        let send = async {
            let response = self.client.post(&self.endpoint).json(request).send().await?;

            let status = response.status();
            if !status.is_success() {
                return Err(ClassifierError::Status(status.as_u16()));
            }

            let body = response.bytes().await?;
            let result: ClassificationResult = serde_json::from_slice(&body)
                .map_err(|e| ClassifierError::Malformed(e.to_string()))?;
            result.check()
        };

        match tokio::time::timeout(self.timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> ClassificationResult {
        debug!(merchant = %request.merchant_normalized, "Calling classifier");

        match self.call(request).await {
            Ok(result) => {
                debug!(
                    category_id = result.category_id,
                    confidence = result.confidence_score,
                    "Classifier response"
                );
                result
            }
            Err(e) => {
                let e = match e {
                    ClassifierError::Transport(inner) if inner.is_timeout() => {
                        ClassifierError::Timeout(self.timeout.as_millis() as u64)
                    }
                    other => other,
                };
                warn!(
                    merchant = %request.merchant_normalized,
                    error = %e,
                    fallback_category = self.fallback.category_id,
                    "Classifier unavailable, using fallback category"
                );
                self.fallback.clone()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            merchant_normalized: "swiggy".to_string(),
            amount: Decimal::from_str("349.50").unwrap(),
            currency: "INR".to_string(),
            recent_category_ids: vec![1, 4],
        }
    }

    fn classifier_for(url: String, timeout_ms: u64) -> HttpClassifier {
        let config = CategorizerConfig {
            classifier_url: url,
            classifier_timeout_ms: timeout_ms,
            ..CategorizerConfig::default()
        };
        HttpClassifier::new(&config).unwrap()
    }

    fn assert_fallback(result: &ClassificationResult) {
        assert_eq!(result.category_id, 15);
        assert_eq!(result.category_name, "Others");
        assert_eq!(result.confidence_score, 0.5);
        assert!(result.alternatives.is_empty());
    }

    #[tokio::test]
    async fn test_success_returns_oracle_result_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/categorize"))
            .and(body_partial_json(json!({
                "merchant_normalized": "swiggy",
                "amount": 349.5,
                "currency": "INR",
                "recent_category_ids": [1, 4]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "category_id": 1,
                "category_name": "Food & Dining",
                "confidence_score": 0.97,
                "alternatives": [
                    {"category_id": 2, "category_name": "Groceries", "score": 0.02}
                ],
                "inference_time": 12,
                "model": "distilbert-financial-v1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = classifier_for(server.uri(), 1000).classify(&request()).await;

        assert_eq!(result.category_id, 1);
        assert_eq!(result.category_name, "Food & Dining");
        assert_eq!(result.confidence_score, 0.97);
        assert_eq!(result.alternatives.len(), 1);
        assert_eq!(result.alternatives[0].category_id, 2);
    }

    #[tokio::test]
    async fn test_timeout_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/categorize"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "category_id": 1,
                        "category_name": "Food & Dining",
                        "confidence_score": 0.97
                    }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let result = classifier_for(server.uri(), 50).classify(&request()).await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_server_error_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/categorize"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = classifier_for(server.uri(), 1000).classify(&request()).await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_malformed_body_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/categorize"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = classifier_for(server.uri(), 1000).classify(&request()).await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_yields_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/categorize"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "category_id": 1,
                "category_name": "Food & Dining",
                "confidence_score": 97.0
            })))
            .mount(&server)
            .await;

        let result = classifier_for(server.uri(), 1000).classify(&request()).await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_unreachable_oracle_yields_fallback() {
        // Port 9 (discard) is not listening in test environments
        let result = classifier_for("http://127.0.0.1:9".to_string(), 500)
            .classify(&request())
            .await;
        assert_fallback(&result);
    }

    #[test]
    fn test_alternatives_accept_confidence_alias() {
        let result: ClassificationResult = serde_json::from_value(json!({
            "category_id": 3,
            "category_name": "Transportation",
            "confidence_score": 0.9,
            "alternatives": [{"category_id": 13, "confidence": 0.05}]
        }))
        .unwrap();

        assert_eq!(result.alternatives[0].score, 0.05);
        assert_eq!(result.alternatives[0].category_name, "");
    }
}
