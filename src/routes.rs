use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::get, Extension, Json, Router};
use tower_http::trace::TraceLayer;

use crate::{
    handler::{
        chat::chat_handler, jobs::jobs_handler, subscriptions::subscriptions_handler,
        transactions::transactions_handler, users::users_handler,
    },
    middleware::auth,
    AppState,
};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_route = Router::new()
        .nest("/users", users_handler())
        .nest("/jobs", jobs_handler())
        .nest("/chats", chat_handler())
        .nest("/subscriptions", subscriptions_handler())
        .nest("/transactions", transactions_handler())
        .layer(middleware::from_fn(auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "success",
        "message": "Service is healthy"
    }))
}
