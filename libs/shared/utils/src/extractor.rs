use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_models::auth::{User, USER_COLUMNS};
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    match auth_value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim().to_string())
        }
        _ => Err(AppError::Auth("Invalid authorization header format".to_string())),
    }
}

/// Resolves the token subject to a stored user. Fails closed on any error.
pub async fn authenticate(config: &AppConfig, headers: &HeaderMap) -> Result<User, AppError> {
    let token = bearer_token(headers)?;

    let claims = validate_token(&token, &config.jwt_secret).map_err(AppError::Auth)?;

    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Auth("Invalid token subject".to_string()))?;

    let client = PostgrestClient::new(config);
    let path = format!("/rest/v1/users?id=eq.{}&select={}", user_id, USER_COLUMNS);

    let user = client
        .select_one::<User>(&path)
        .await
        .map_err(|e| {
            error!("Failed to resolve token subject {}: {}", user_id, e);
            AppError::Auth("Unable to resolve user".to_string())
        })?
        .ok_or_else(|| AppError::Auth("User not found".to_string()))?;

    debug!("Authenticated user {}", user.id);
    Ok(user)
}

pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&config, request.headers()).await?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
