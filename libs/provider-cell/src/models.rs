use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_utils::datetime::to_hhmm;

pub const DEFAULT_SERVICE_DURATION_MINUTES: i32 = 30;
pub const MAX_SERVICE_DURATION_MINUTES: i32 = 24 * 60;

/// A user's bookable business. `code` is the public booking-page handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Provider {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub provider: Provider,
    pub created: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    /// Minor currency units.
    pub price: i64,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub duration_minutes: Option<i32>,
    pub price: Option<i64>,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub duration_minutes: Option<i32>,
    pub price: Option<i64>,
    pub active: Option<bool>,
}

/// Weekly recurring window. `day_of_week` 0 = Sunday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityBlock {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Public rendering of a block with `HH:MM` times.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityView {
    pub id: Uuid,
    pub day_of_week: i16,
    pub start_time: String,
    pub end_time: String,
}

impl From<&AvailabilityBlock> for AvailabilityView {
    fn from(block: &AvailabilityBlock) -> Self {
        Self {
            id: block.id,
            day_of_week: block.day_of_week,
            start_time: to_hhmm(&block.start_time),
            end_time: to_hhmm(&block.end_time),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub day_of_week: i16,
    pub start_time: String,
    pub end_time: String,
    pub active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub day_of_week: Option<i16>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Only providers can manage this resource")]
    NotProvider,

    #[error("You are not a provider")]
    ProfileNotFound,

    #[error("Provider not found")]
    UnknownCode,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Could not generate a unique public code, try again")]
    CodeGenerationExhausted,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotProvider => AppError::Forbidden(err.to_string()),
            ProviderError::ProfileNotFound | ProviderError::UnknownCode | ProviderError::NotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            ProviderError::CodeGenerationExhausted => AppError::Internal(err.to_string()),
            ProviderError::Validation(msg) => AppError::ValidationError(msg),
            ProviderError::Duplicate(msg) => AppError::Conflict(msg),
            ProviderError::Database(db) => AppError::from(db),
        }
    }
}

/// Trims and uppercases a public code as typed by a visitor.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
