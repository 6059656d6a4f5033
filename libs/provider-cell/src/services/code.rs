use rand::Rng;
use serde_json::Value;
use tracing::debug;

use shared_database::PostgrestClient;

use crate::models::ProviderError;

/// Uppercase letters and digits without the look-alikes O, I, L, 0 and 1.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const CODE_LENGTH: usize = 6;
pub const MAX_CODE_ATTEMPTS: usize = 50;

pub fn generate_candidate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Draws candidates until one is not stored yet.
pub async fn generate_unique_code<R: Rng + Send>(
    db: &PostgrestClient,
    rng: &mut R,
) -> Result<String, ProviderError> {
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let candidate = generate_candidate(rng);
        let path = format!("/rest/v1/providers?code=eq.{}&select=id", candidate);
        let taken: Vec<Value> = db.select(&path).await?;

        if taken.is_empty() {
            return Ok(candidate);
        }
        debug!("Public code {} already taken (attempt {})", candidate, attempt);
    }

    Err(ProviderError::CodeGenerationExhausted)
}
