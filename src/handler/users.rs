use std::sync::Arc;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::userdb::UserExt,
    dtos::{jobdtos::ApiResponse, userdtos::UpdateProfileDto},
    error::HttpError,
    middleware::JwtAuthMiddleware,
    models::usermodel::Profile,
    AppState,
};

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/me", put(update_me))
        .route("/:user_id", get(get_user))
}

pub async fn get_me(
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let response: ApiResponse<Profile> = ApiResponse::success("Profile retrieved", user.profile);
    Ok(Json(response))
}

/// Public profile of another marketplace member, e.g. the poster behind a
/// job or an applicant behind an application.
pub async fn get_user(
    Path(user_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state
        .db_client
        .get_profile_by_id(user_id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?
        .ok_or_else(|| HttpError::not_found("Profile not found".to_string()))?;

    let response: ApiResponse<Profile> = ApiResponse::success("Profile retrieved", profile);
    Ok(Json(response))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    // Self-edit cannot escalate: admin is granted by an admin, never taken.
    if !user.profile.role.may_grant(body.role) {
        return Err(HttpError::forbidden(
            "Only an admin can grant the admin role".to_string(),
        ));
    }

    let profile = app_state
        .db_client
        .update_profile(
            user.profile.id,
            body.name,
            body.role,
            body.district,
            body.city,
            body.phone,
            body.avatar_url,
        )
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    let response: ApiResponse<Profile> = ApiResponse::success("Profile updated", profile);
    Ok(Json(response))
}
