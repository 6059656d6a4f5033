use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token;

use crate::models::{LoginRequest, RegisterRequest, UpdateMeRequest};
use crate::services::AccountService;

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let account_service = AccountService::new(&config);

    let user = account_service.register(request).await?;

    Ok((StatusCode::CREATED, Json(json!(user))))
}

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let account_service = AccountService::new(&config);

    let token = account_service.login(request).await?;

    Ok(Json(json!(token)))
}

#[axum::debug_handler]
pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;
    let claims = validate_token(&token, &config.jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: claims.sub,
        role: claims.role,
    }))
}

#[axum::debug_handler]
pub async fn me(Extension(user): Extension<User>) -> Result<Json<Value>, AppError> {
    Ok(Json(json!(user)))
}

#[axum::debug_handler]
pub async fn update_me(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateMeRequest>,
) -> Result<Json<Value>, AppError> {
    let account_service = AccountService::new(&config);

    let updated = account_service.update_me(&user, request).await?;

    Ok(Json(json!(updated)))
}
