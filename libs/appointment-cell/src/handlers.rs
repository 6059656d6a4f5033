use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CreateAppointmentRequest, RangeQuery, UpdateAppointmentRequest};
use crate::services::{BookingService, PublicAgendaService};

// ==============================================================================
// PUBLIC BOOKING PAGE
// ==============================================================================

#[axum::debug_handler]
pub async fn public_agenda(
    State(state): State<Arc<AppConfig>>,
    Path(code): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Value>, AppError> {
    let agenda = PublicAgendaService::new(&state)
        .agenda_by_code(&code, &range)
        .await?;

    Ok(Json(json!(agenda)))
}

#[axum::debug_handler]
pub async fn appointments_by_code(
    State(state): State<Arc<AppConfig>>,
    Path(code): Path<String>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = PublicAgendaService::new(&state)
        .appointments_by_code(&code, &range)
        .await?;

    Ok(Json(json!(appointments)))
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = BookingService::new(&state).create(&user, request).await?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = BookingService::new(&state).list_mine(&user, &range).await?;

    Ok(Json(json!(appointments)))
}

/// Calendar of the caller's provider profile.
#[axum::debug_handler]
pub async fn list_owner_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(range): Query<RangeQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = BookingService::new(&state).list_owner(&user, &range).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingService::new(&state).get(&user, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = BookingService::new(&state)
        .update(&user, appointment_id, request)
        .await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    BookingService::new(&state).delete(&user, appointment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
