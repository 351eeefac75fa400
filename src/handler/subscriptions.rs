use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};

use crate::{
    db::subscriptiondb::SubscriptionExt,
    dtos::{
        jobdtos::ApiResponse,
        userdtos::{EntitlementResponse, PurchaseSubscriptionDto},
    },
    error::HttpError,
    middleware::JwtAuthMiddleware,
    models::subscriptionmodel::Subscription,
    AppState,
};

pub fn subscriptions_handler() -> Router {
    Router::new()
        .route("/", post(purchase_subscription))
        .route("/entitlement", get(posting_entitlement))
}

pub async fn purchase_subscription(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<PurchaseSubscriptionDto>,
) -> Result<impl IntoResponse, HttpError> {
    if !user.profile.role.may_post_jobs() {
        return Err(HttpError::forbidden(
            "Workers do not need a posting subscription".to_string(),
        ));
    }

    let subscription = app_state
        .db_client
        .create_subscription(user.profile.id, body.plan)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    let response: ApiResponse<Subscription> =
        ApiResponse::success("Subscription activated", subscription);
    Ok(Json(response))
}

pub async fn posting_entitlement(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let active = app_state
        .db_client
        .get_active_subscription(user.profile.id)
        .await
        .map_err(|err| HttpError::server_error(err.to_string()))?;

    let entitlement = match active {
        Some(subscription) => EntitlementResponse {
            entitled: true,
            remaining_ads: subscription.remaining_ads,
        },
        None => EntitlementResponse {
            entitled: user.profile.role.posts_free(),
            remaining_ads: 0,
        },
    };

    Ok(Json(ApiResponse::success("Entitlement retrieved", entitlement)))
}
