// NUBAN Toolkit - Web Server
// REST API with Axum
//
//   nuban-server [path/to/nuban.toml]

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use nuban_toolkit::entities::account::{
    AccountError, AccountFilters, AccountType, AccountVerification, NubanAccount,
    OpenAccountRequest, Page,
};
use nuban_toolkit::export::{default_export_filename, export_csv_string, export_json, ExportFormat};
use nuban_toolkit::{
    AppConfig, Bank, BatchItem, BatchSummary, CodecError, GeneratedNuban, GenerationRecord,
    NubanService, ServiceStats, ValidationOutcome, ValidationRecord, ValidationType,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<NubanService>>,
}

impl AppState {
    fn service(&self) -> Result<MutexGuard<'_, NubanService>, ApiError> {
        self.service
            .lock()
            .map_err(|_| ApiError::internal("service state is poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            message: None,
            timestamp: Utc::now(),
        }
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Error half of every handler; rendered as an ApiResponse with success=false
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CodecError>() {
            Some(codec_err) => ApiError::bad_request(codec_err.to_string()),
            None => {
                tracing::error!(error = %err, "request failed");
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::NotFound(_) => ApiError::not_found(err.to_string()),
            AccountError::DuplicateAccountNumber(_) => Self {
                status: StatusCode::CONFLICT,
                message: err.to_string(),
            },
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.message),
            message: None,
            timestamp: Utc::now(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct GenerateRequest {
    bank_code: String,
}

#[derive(Deserialize)]
struct ValidateRequest {
    nuban: String,
    #[serde(default)]
    bank_code: Option<String>,
}

#[derive(Deserialize)]
struct VerifyRequest {
    account_number: String,
    bank_code: String,
}

#[derive(Deserialize)]
struct AccountQuery {
    page: Option<usize>,
    page_size: Option<usize>,
    bank_code: Option<String>,
    account_type: Option<AccountType>,
    min_balance: Option<f64>,
    max_balance: Option<f64>,
    search: Option<String>,
}

#[derive(Serialize)]
struct BatchResponse {
    results: Vec<ValidationOutcome>,
    summary: BatchSummary,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/banks - Bank directory
async fn get_banks(State(state): State<AppState>) -> ApiResult<Vec<Bank>> {
    let service = state.service()?;
    let banks: Vec<Bank> = service.banks().into_iter().cloned().collect();
    Ok(Json(ApiResponse::ok(banks)))
}

/// POST /api/nuban/generate - Generate a NUBAN for a bank
async fn generate_nuban(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<GeneratedNuban> {
    let mut service = state.service()?;
    let generated = service.generate(&request.bank_code)?;
    let message = format!("Generated NUBAN {}", generated.nuban);
    Ok(Json(ApiResponse::ok(generated).with_message(message)))
}

/// POST /api/nuban/validate - Validate one NUBAN
async fn validate_nuban(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<ValidationOutcome> {
    let mut service = state.service()?;
    let outcome = service.validate(
        &request.nuban,
        request.bank_code.as_deref(),
        ValidationType::Api,
    )?;
    let message = outcome.reason.clone();
    Ok(Json(ApiResponse::ok(outcome).with_message(message)))
}

/// POST /api/nuban/batch-validate - Validate a list of NUBANs
async fn batch_validate(
    State(state): State<AppState>,
    Json(items): Json<Vec<BatchItem>>,
) -> ApiResult<BatchResponse> {
    if items.is_empty() {
        return Err(ApiError::bad_request("batch must contain at least one NUBAN"));
    }

    let mut service = state.service()?;
    let (results, summary) = service.batch_validate(&items)?;
    let message = summary.message();
    Ok(Json(
        ApiResponse::ok(BatchResponse { results, summary }).with_message(message),
    ))
}

/// GET /api/stats - Validation statistics
async fn get_stats(State(state): State<AppState>) -> ApiResult<ServiceStats> {
    let service = state.service()?;
    Ok(Json(ApiResponse::ok(service.stats())))
}

/// GET /api/history/generated
async fn get_generated(State(state): State<AppState>) -> ApiResult<Vec<GenerationRecord>> {
    let service = state.service()?;
    let records = service.generations().entries().cloned().collect();
    Ok(Json(ApiResponse::ok(records)))
}

/// GET /api/history/validations
async fn get_validations(State(state): State<AppState>) -> ApiResult<Vec<ValidationRecord>> {
    let service = state.service()?;
    let records = service.validations().entries().cloned().collect();
    Ok(Json(ApiResponse::ok(records)))
}

/// DELETE /api/history/validations/:id
async fn delete_validation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let mut service = state.service()?;
    if !service.remove_validation(&id)? {
        return Err(ApiError::not_found(format!("validation not found: {}", id)));
    }
    Ok(Json(ApiResponse::ok(true)))
}

/// DELETE /api/history - Clear both histories
async fn clear_history(State(state): State<AppState>) -> ApiResult<bool> {
    let mut service = state.service()?;
    service.clear_history()?;
    Ok(Json(ApiResponse::ok(true).with_message("History cleared".to_string())))
}

/// GET /api/export/:format - Download history as json or csv
async fn export_history(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> Result<Response, ApiError> {
    let format = ExportFormat::parse(&format)
        .ok_or_else(|| ApiError::bad_request(format!("unknown export format: {}", format)))?;

    let service = state.service()?;
    let body = match format {
        ExportFormat::Json => export_json(&service.snapshot())?,
        ExportFormat::Csv => export_csv_string(service.generations(), service.validations())?,
    };
    let filename = default_export_filename(format, Utc::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// GET /api/accounts - Filtered, paginated accounts
async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> ApiResult<Page<NubanAccount>> {
    let filters = AccountFilters {
        bank_code: query.bank_code,
        account_type: query.account_type,
        min_balance: query.min_balance,
        max_balance: query.max_balance,
        search_term: query.search,
        ..AccountFilters::default()
    };

    let service = state.service()?;
    let page = service.accounts().list(
        &filters,
        query.page.unwrap_or(1),
        query.page_size.unwrap_or(20),
    );
    Ok(Json(ApiResponse::ok(page)))
}

/// POST /api/accounts - Open an account with a fresh NUBAN
async fn open_account(
    State(state): State<AppState>,
    Json(request): Json<OpenAccountRequest>,
) -> ApiResult<NubanAccount> {
    let mut service = state.service()?;
    let account = service.open_account(request)?;
    Ok(Json(ApiResponse::ok(account).with_message("Account created".to_string())))
}

/// GET /api/accounts/:id
async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NubanAccount> {
    let service = state.service()?;
    let account = service
        .accounts()
        .find_by_id(&id)
        .cloned()
        .ok_or_else(|| ApiError::from(AccountError::NotFound(id)))?;
    Ok(Json(ApiResponse::ok(account)))
}

/// DELETE /api/accounts/:id
async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<bool> {
    let mut service = state.service()?;
    if !service.accounts_mut().delete(&id) {
        return Err(AccountError::NotFound(id).into());
    }
    Ok(Json(ApiResponse::ok(true)))
}

/// POST /api/accounts/verify - Check digit + lookup
async fn verify_account(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<AccountVerification> {
    let service = state.service()?;
    let verification = service.verify_account(&request.account_number, &request.bank_code);
    Ok(Json(ApiResponse::ok(verification)))
}

// ============================================================================
// Main Server
// ============================================================================

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/banks", get(get_banks))
        .route("/nuban/generate", post(generate_nuban))
        .route("/nuban/validate", post(validate_nuban))
        .route("/nuban/batch-validate", post(batch_validate))
        .route("/stats", get(get_stats))
        .route("/history", delete(clear_history))
        .route("/history/generated", get(get_generated))
        .route("/history/validations", get(get_validations))
        .route("/history/validations/:id", delete(delete_validation))
        .route("/export/:format", get(export_history))
        .route("/accounts", get(list_accounts).post(open_account))
        .route("/accounts/verify", post(verify_account))
        .route("/accounts/:id", get(get_account).delete(delete_account))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(std::path::PathBuf::from);
    let config = AppConfig::resolve(config_path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let service = NubanService::from_config(&config)?;
    tracing::info!(banks = service.directory().len(), "bank directory loaded");

    let state = AppState {
        service: Arc::new(Mutex::new(service)),
    };

    let listener = tokio::net::TcpListener::bind(config.server.listen).await?;
    tracing::info!(addr = %config.server.listen, "🚀 NUBAN server running");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
