use std::sync::Arc;

use axum::{
    extract::Request,
    http::header,
    middleware::Next,
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    db::userdb::UserExt,
    error::{ErrorMessage, HttpError},
    models::usermodel::Profile,
    utils::token::decode_token,
    AppState,
};

/// Resolved identity injected into request extensions for every
/// authenticated route.
#[derive(Debug, Clone)]
pub struct JwtAuthMiddleware {
    pub profile: Profile,
}

/// Session tokens are issued by the external auth provider; this layer
/// verifies them and resolves (or lazily creates) the local profile.
pub async fn auth(
    cookie_jar: CookieJar,
    Extension(app_state): Extension<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|value| value.to_string())
        })
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::TokenNotProvided.to_str()))?;

    let claims = decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let profile = app_state
        .db_client
        .get_or_create_profile(&claims.sub, &claims.email, &claims.name)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => {
                HttpError::unauthorized(ErrorMessage::ProfileNoLongerExists.to_str())
            }
            _ => HttpError::server_error(err.to_string()),
        })?;

    req.extensions_mut().insert(JwtAuthMiddleware { profile });
    Ok(next.run(req).await)
}
