// Merchant Categorizer - Web Server
// REST API over the categorization pipeline (axum)

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use merchant_categorizer::{
    init_tracing, BatchIngestor, BatchSummary, CategorizationError, Categorizer,
    CategorizerConfig, NewTransaction, Transaction, TransactionFilter,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Header set by the gateway after authentication
const USER_ID_HEADER: &str = "x-user-id";

/// Shared application state
#[derive(Clone)]
struct AppState {
    categorizer: Arc<Categorizer>,
    ingestor: Arc<BatchIngestor>,
    default_currency: String,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
    )
        .into_response()
}

fn categorization_error_response(err: CategorizationError) -> Response {
    let status = match &err {
        CategorizationError::Validation(_) => StatusCode::BAD_REQUEST,
        CategorizationError::NotFound(_) => StatusCode::NOT_FOUND,
        CategorizationError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        CategorizationError::Storage(e) => {
            error!(error = %e, "Storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(status, err.to_string())
}

fn user_id(headers: &HeaderMap) -> Result<i64, Response> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            error_response(
                StatusCode::UNAUTHORIZED,
                format!("missing or invalid {} header", USER_ID_HEADER),
            )
        })
}

/// Transaction view returned to clients
#[derive(Serialize)]
struct TransactionResponse {
    transaction_id: i64,
    merchant_name: String,
    merchant_normalized: String,
    amount: Decimal,
    currency: String,
    transaction_date: NaiveDate,
    category_id: Option<i64>,
    confidence_score: f64,
    is_user_corrected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            description: tx.description().map(str::to_string),
            transaction_id: tx.id,
            merchant_name: tx.merchant_name,
            merchant_normalized: tx.merchant_normalized,
            amount: tx.amount,
            currency: tx.currency,
            transaction_date: tx.transaction_date,
            category_id: tx.category_id,
            confidence_score: tx.confidence_score,
            is_user_corrected: tx.is_user_corrected,
            created_at: tx.created_at,
        }
    }
}

#[derive(Deserialize)]
struct TransactionRequest {
    merchant_name: String,
    amount: Decimal,
    currency: Option<String>,
    transaction_date: NaiveDate,
    description: Option<String>,
}

#[derive(Deserialize)]
struct UpdateCategoryRequest {
    category_id: i64,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct ListQuery {
    category_id: Option<i64>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    #[serde(default)]
    page: usize,
    size: Option<usize>,
}

/// Row offset for a zero-based page; absurd page numbers clamp instead of overflowing
fn page_offset(page: usize, size: usize) -> usize {
    page.saturating_mul(size)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/transactions - Categorize and store one transaction
async fn create_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TransactionRequest>,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!(user_id, "POST /api/transactions");

    let new_tx = NewTransaction {
        user_id,
        merchant_name: request.merchant_name,
        amount: request.amount,
        currency: request
            .currency
            .unwrap_or_else(|| state.default_currency.clone()),
        transaction_date: request.transaction_date,
        description: request.description,
    };

    match state.categorizer.categorize_and_persist(new_tx).await {
        Ok(tx) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(TransactionResponse::from(tx))),
        )
            .into_response(),
        Err(e) => categorization_error_response(e),
    }
}

/// POST /api/transactions/batch - CSV body, one transaction per row
async fn upload_batch(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let user_id = match user_id(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!(user_id, bytes = body.len(), "POST /api/transactions/batch");

    if body.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "File is empty".to_string());
    }

    match state.ingestor.ingest_csv(user_id, body.as_bytes()).await {
        Ok(summary) => (StatusCode::OK, Json(ApiResponse::<BatchSummary>::ok(summary))).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

/// GET /api/transactions - List the caller's transactions
async fn list_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let size = query.size.unwrap_or(20).clamp(1, 500);
    let filter = TransactionFilter {
        category_id: query.category_id,
        start_date: query.start_date,
        end_date: query.end_date,
        limit: Some(size),
        offset: Some(page_offset(query.page, size)),
    };

    match state.categorizer.list_transactions(user_id, &filter) {
        Ok(transactions) => {
            let response: Vec<TransactionResponse> =
                transactions.into_iter().map(|tx| tx.into()).collect();
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e) => categorization_error_response(e),
    }
}

/// PUT /api/transactions/:id/category - Apply a user correction
async fn update_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(transaction_id): Path<i64>,
    Json(request): Json<UpdateCategoryRequest>,
) -> Response {
    let user_id = match user_id(&headers) {
        Ok(id) => id,
        Err(response) => return response,
    };
    info!(user_id, transaction_id, category_id = request.category_id, "PUT /api/transactions/:id/category");

    match state
        .categorizer
        .apply_user_correction_with_note(
            transaction_id,
            user_id,
            request.category_id,
            request.notes.as_deref(),
        )
        .await
    {
        Ok(tx) => (StatusCode::OK, Json(ApiResponse::ok(TransactionResponse::from(tx)))).into_response(),
        Err(e) => categorization_error_response(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = match std::env::var("CATEGORIZER_CONFIG") {
        Ok(path) => {
            let mut config = CategorizerConfig::from_file(&path)?;
            config.apply_env()?;
            config.validate()?;
            config
        }
        Err(_) => CategorizerConfig::from_env()?,
    };

    let categorizer = Arc::new(Categorizer::open(&config)?);
    let state = AppState {
        ingestor: Arc::new(BatchIngestor::new(categorizer.clone(), &config)),
        categorizer,
        default_currency: config.default_currency.clone(),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/transactions", post(create_transaction).get(list_transactions))
        .route("/transactions/batch", post(upload_batch))
        .route("/transactions/:id/category", put(update_category))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let addr = std::env::var("CATEGORIZER_LISTEN").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, classifier = %config.classifier_url, "Categorizer server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
