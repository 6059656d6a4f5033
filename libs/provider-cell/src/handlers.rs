use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilityRequest, CreateServiceRequest, UpdateAvailabilityRequest,
    UpdateProviderRequest, UpdateServiceRequest,
};
use crate::services::{AvailabilityService, CatalogService, ProviderService};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_provider_by_code(
    State(state): State<Arc<AppConfig>>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider_service = ProviderService::new(&state);

    let provider = provider_service.get_by_code(&code).await?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn list_services_by_code(
    State(state): State<Arc<AppConfig>>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider = ProviderService::new(&state).get_by_code(&code).await?;

    let services = CatalogService::new(&state)
        .list_for_provider(provider.id, true)
        .await?;

    Ok(Json(json!(services)))
}

#[axum::debug_handler]
pub async fn list_availability_by_code(
    State(state): State<Arc<AppConfig>>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let provider = ProviderService::new(&state).get_by_code(&code).await?;

    let blocks = AvailabilityService::new(&state).public_view(provider.id).await?;

    Ok(Json(json!(blocks)))
}

// ==============================================================================
// PROVIDER PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn activate_provider(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let provider_service = ProviderService::new(&state);

    let activation = provider_service.activate(&user).await?;

    let (status, detail) = if activation.created {
        (StatusCode::CREATED, "Provider activated")
    } else {
        (StatusCode::OK, "Already a provider")
    };

    Ok((status, Json(json!({
        "detail": detail,
        "created": activation.created,
        "provider": activation.provider
    }))))
}

#[axum::debug_handler]
pub async fn get_my_provider(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let provider = ProviderService::new(&state).get_mine(&user).await?;

    Ok(Json(json!(provider)))
}

#[axum::debug_handler]
pub async fn update_my_provider(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateProviderRequest>,
) -> Result<Json<Value>, AppError> {
    let provider = ProviderService::new(&state).update_mine(&user, request).await?;

    Ok(Json(json!(provider)))
}

// ==============================================================================
// SERVICE CATALOG
// ==============================================================================

#[axum::debug_handler]
pub async fn list_my_services(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let services = CatalogService::new(&state).list_mine(&user).await?;

    Ok(Json(json!(services)))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateServiceRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = CatalogService::new(&state).create(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!(service))))
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<Value>, AppError> {
    let service = CatalogService::new(&state)
        .update(&user, service_id, request)
        .await?;

    Ok(Json(json!(service)))
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(service_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    CatalogService::new(&state).delete(&user, service_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn list_my_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let blocks = AvailabilityService::new(&state).list_mine(&user).await?;

    Ok(Json(json!(blocks)))
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let block = AvailabilityService::new(&state).create(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!(block))))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let block = AvailabilityService::new(&state)
        .update(&user, block_id, request)
        .await?;

    Ok(Json(json!(block)))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    AvailabilityService::new(&state).delete(&user, block_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
