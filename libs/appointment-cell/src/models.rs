use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use provider_cell::{AvailabilityView, Provider, ProviderError, Service};
use shared_database::DatabaseError;
use shared_models::error::AppError;

/// Length of an appointment booked without a service.
pub const DEFAULT_APPOINTMENT_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    #[default]
    Confirmed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A booking in a provider's calendar. `start_at`/`end_at` are wall-clock
/// times without a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    /// Service price at booking time, minor currency units.
    pub applied_price: Option<i64>,
    pub client_name: Option<String>,
    pub client_contact: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// What a public booking page may see of an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicAppointment {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub start_at: NaiveDateTime,
    pub end_at: NaiveDateTime,
    pub status: AppointmentStatus,
}

impl From<Appointment> for PublicAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            service_id: appointment.service_id,
            start_at: appointment.start_at,
            end_at: appointment.end_at,
            status: appointment.status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicAgenda {
    pub provider: Provider,
    pub services: Vec<Service>,
    pub availability: Vec<AvailabilityView>,
    pub appointments: Vec<PublicAppointment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateAppointmentRequest {
    pub provider_id: Option<Uuid>,
    pub provider_code: Option<String>,
    #[serde(default, deserialize_with = "blank_uuid")]
    pub service_id: Option<Uuid>,
    #[serde(alias = "start_at", alias = "datetime")]
    pub start: Option<String>,
    #[serde(alias = "end_at")]
    pub end: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub client_name: Option<String>,
    pub client_contact: Option<String>,
}

/// Service reference in an update: omitted, explicitly cleared, or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServicePatch {
    #[default]
    Keep,
    Clear,
    Set(Uuid),
}

impl ServicePatch {
    pub fn apply(self, current: Option<Uuid>) -> Option<Uuid> {
        match self {
            ServicePatch::Keep => current,
            ServicePatch::Clear => None,
            ServicePatch::Set(id) => Some(id),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(alias = "start_at", alias = "datetime")]
    pub start: Option<String>,
    #[serde(alias = "end_at")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "service_patch")]
    pub service_id: ServicePatch,
    pub status: Option<AppointmentStatus>,
    pub cancellation_reason: Option<String>,
    pub client_name: Option<String>,
    pub client_contact: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// `null` and `""` both mean "no service".
fn blank_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => Uuid::parse_str(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn service_patch<'de, D>(deserializer: D) -> Result<ServicePatch, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match blank_uuid(deserializer)? {
        Some(id) => ServicePatch::Set(id),
        None => ServicePatch::Clear,
    })
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Provider not found")]
    ProviderNotFound,

    #[error("Service not found for this provider")]
    ServiceNotFound,

    #[error("provider_id or provider_code is required")]
    MissingProvider,

    #[error("A valid start date-time is required")]
    MissingStart,

    #[error("Invalid start date-time: {0}")]
    InvalidStart(String),

    #[error("Invalid end date-time: {0}")]
    InvalidEnd(String),

    #[error("End must be after start")]
    EndBeforeStart,

    #[error("{0}")]
    InvalidRange(String),

    #[error("That time slot is already booked")]
    SlotTaken,

    #[error("You already have an appointment at that time")]
    AlreadyBooked,

    #[error("Not allowed to access this appointment")]
    Unauthorized,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::ProviderNotFound
            | AppointmentError::ServiceNotFound => AppError::NotFound(err.to_string()),
            AppointmentError::MissingProvider
            | AppointmentError::MissingStart
            | AppointmentError::InvalidStart(_)
            | AppointmentError::InvalidEnd(_)
            | AppointmentError::EndBeforeStart
            | AppointmentError::InvalidRange(_) => AppError::ValidationError(err.to_string()),
            AppointmentError::SlotTaken | AppointmentError::AlreadyBooked => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::Provider(inner) => AppError::from(inner),
            AppointmentError::Database(inner) => AppError::from(inner),
        }
    }
}
