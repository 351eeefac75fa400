use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::{
    db::{jobdb::JobExt, ledgerdb::LedgerExt},
    dtos::jobdtos::{ApiResponse, PaginationQuery},
    error::HttpError,
    middleware::JwtAuthMiddleware,
    models::ledgermodel::Transaction,
    AppState,
};

pub fn transactions_handler() -> Router {
    Router::new()
        .route("/", get(my_transactions))
        .route("/job/:job_id", get(job_transactions))
}

pub async fn my_transactions(
    Query(query): Query<PaginationQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let (limit, offset) = query.limit_offset();
    let transactions = app_state
        .db_client
        .list_transactions_for_user(user.profile.id, limit, offset)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    let response: ApiResponse<Vec<Transaction>> =
        ApiResponse::success("Transactions retrieved", transactions);
    Ok(Json(response))
}

/// Both parties to a settlement can audit the job's ledger rows.
pub async fn job_transactions(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .db_client
        .get_job_by_id(job_id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?
        .ok_or_else(|| HttpError::not_found("Job not found".to_string()))?;

    let is_party =
        job.owner_id == user.profile.id || job.selected_worker_id == Some(user.profile.id);
    if !is_party {
        return Err(HttpError::forbidden(
            "Only the job's parties can view its transactions".to_string(),
        ));
    }

    let transactions = app_state
        .db_client
        .list_transactions_for_job(job_id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    let response: ApiResponse<Vec<Transaction>> =
        ApiResponse::success("Job transactions retrieved", transactions);
    Ok(Json(response))
}
