use serde::Deserialize;
use thiserror::Error;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Store rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Store returned no rows")]
    EmptyResult,

    #[error("Invalid store configuration: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl DatabaseError {
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<PostgrestErrorBody> = serde_json::from_str(body).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| body.to_string());

        match (status, code.as_deref()) {
            (_, Some(UNIQUE_VIOLATION)) => DatabaseError::UniqueViolation(message),
            (_, Some(FOREIGN_KEY_VIOLATION)) => DatabaseError::ForeignKeyViolation(message),
            (401 | 403, _) => DatabaseError::Unauthorized(message),
            _ => DatabaseError::Api { status, message },
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }
}
