pub mod error;
pub mod postgrest;

pub use error::DatabaseError;
pub use postgrest::PostgrestClient;
