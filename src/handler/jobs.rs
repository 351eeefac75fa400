use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::jobdb::JobExt,
    dtos::jobdtos::*,
    error::HttpError,
    middleware::JwtAuthMiddleware,
    AppState,
};

pub fn jobs_handler() -> Router {
    Router::new()
        .route("/", post(create_job).get(search_jobs))
        .route("/mine", get(my_postings))
        .route("/applications/mine", get(my_applications))
        .route("/applications/:application_id/reject", put(reject_application))
        .route("/:job_id", get(job_detail))
        .route("/:job_id", delete(delete_job))
        .route("/:job_id/pause", put(pause_job))
        .route("/:job_id/reactivate", put(reactivate_job))
        .route("/:job_id/apply", post(apply_to_job))
        .route("/:job_id/applications", get(job_applications))
        .route("/:job_id/applications/:application_id/accept", post(accept_application))
        .route("/:job_id/settle", post(settle_job))
}

pub async fn create_job(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<CreateJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let job = app_state.job_service.create_job(&user.profile, body).await?;
    Ok(Json(ApiResponse::success("Job created", job)))
}

pub async fn search_jobs(
    Query(query): Query<SearchJobsDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let pagination = PaginationQuery {
        page: query.page,
        limit: query.limit,
    };
    let (limit, offset) = pagination.limit_offset();

    let jobs = app_state
        .db_client
        .list_open_jobs(query.category, query.district, limit, offset)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    Ok(Json(JobsResponse {
        status: "success".to_string(),
        message: "Open jobs retrieved".to_string(),
        data: jobs,
    }))
}

pub async fn my_postings(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let jobs = app_state
        .db_client
        .list_jobs_by_owner(user.profile.id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    Ok(Json(JobsResponse {
        status: "success".to_string(),
        message: "Your postings retrieved".to_string(),
        data: jobs,
    }))
}

pub async fn my_applications(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let applications = app_state
        .db_client
        .list_applications_by_worker(user.profile.id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    Ok(Json(ApplicationsResponse {
        status: "success".to_string(),
        message: "Your applications retrieved".to_string(),
        data: applications,
    }))
}

pub async fn job_detail(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let detail = app_state.job_service.job_detail(job_id).await?;
    Ok(Json(ApiResponse::success("Job retrieved", detail)))
}

pub async fn pause_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state.job_service.pause_job(&user.profile, job_id).await?;
    Ok(Json(ApiResponse::success("Job paused", job)))
}

pub async fn reactivate_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let job = app_state
        .job_service
        .reactivate_job(&user.profile, job_id)
        .await?;
    Ok(Json(ApiResponse::success("Job reactivated", job)))
}

pub async fn delete_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    app_state.job_service.delete_job(&user.profile, job_id).await?;
    Ok(Json(ApiResponse::success("Job deleted", ())))
}

pub async fn apply_to_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<CreateApplicationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let application = app_state.job_service.apply(&user.profile, job_id, body).await?;
    Ok(Json(ApiResponse::success("Application submitted", application)))
}

pub async fn job_applications(
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

    if job.owner_id != user.profile.id {
        return Err(HttpError::forbidden(
            "Only the job owner can view applications".to_string(),
        ));
    }

    let applications = app_state
        .db_client
        .list_applications_for_job(job_id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    Ok(Json(ApplicationsResponse {
        status: "success".to_string(),
        message: "Applications retrieved".to_string(),
        data: applications,
    }))
}

pub async fn accept_application(
    Path((job_id, application_id)): Path<(Uuid, Uuid)>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let (job, application) = app_state
        .job_service
        .accept_application(&user.profile, job_id, application_id)
        .await?;

    Ok(Json(ApiResponse::success(
        "Application accepted",
        AcceptApplicationResponse { job, application },
    )))
}

pub async fn reject_application(
    Path(application_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let application = app_state
        .job_service
        .reject_application(&user.profile, application_id)
        .await?;
    Ok(Json(ApiResponse::success("Application rejected", application)))
}

pub async fn settle_job(
    Path(job_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<SettleJobDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let (job, payment, income) = app_state
        .job_service
        .settle_job(&user.profile, job_id, body)
        .await?;

    Ok(Json(ApiResponse::success(
        "Job settled",
        SettlementResponse { job, payment, income },
    )))
}
