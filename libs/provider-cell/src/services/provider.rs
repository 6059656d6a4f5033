use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, PostgrestClient};
use shared_models::auth::{User, UserRole};

use crate::models::{normalize_code, Activation, Provider, ProviderError, UpdateProviderRequest};
use crate::services::code::generate_unique_code;

/// Looks up the provider owned by `user_id`, if any.
pub async fn provider_for_user(
    db: &PostgrestClient,
    user_id: Uuid,
) -> Result<Option<Provider>, DatabaseError> {
    let path = format!("/rest/v1/providers?user_id=eq.{}", user_id);
    db.select_one(&path).await
}

/// Like [`provider_for_user`] but refuses callers without a provider.
pub async fn require_provider(db: &PostgrestClient, user: &User) -> Result<Provider, ProviderError> {
    provider_for_user(db, user.id)
        .await?
        .ok_or(ProviderError::NotProvider)
}

/// Inserts retried when another activation claims the probed code first.
pub const MAX_INSERT_ATTEMPTS: usize = 3;

pub struct ProviderService {
    db: PostgrestClient,
}

impl ProviderService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn find_by_id(&self, provider_id: Uuid) -> Result<Option<Provider>, ProviderError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        Ok(self.db.select_one(&path).await?)
    }

    pub async fn get_by_code(&self, raw_code: &str) -> Result<Provider, ProviderError> {
        let code = normalize_code(raw_code);
        if code.is_empty() {
            return Err(ProviderError::UnknownCode);
        }

        debug!("Resolving provider by code {}", code);
        let path = format!("/rest/v1/providers?code=eq.{}", urlencoding::encode(&code));
        self.db
            .select_one(&path)
            .await?
            .ok_or(ProviderError::UnknownCode)
    }

    pub async fn get_mine(&self, user: &User) -> Result<Provider, ProviderError> {
        provider_for_user(&self.db, user.id)
            .await?
            .ok_or(ProviderError::ProfileNotFound)
    }

    pub async fn update_mine(
        &self,
        user: &User,
        request: UpdateProviderRequest,
    ) -> Result<Provider, ProviderError> {
        let current = self.get_mine(user).await?;

        let mut changes = Map::new();
        if let Some(name) = request.name {
            changes.insert("name".into(), json!(name.trim()));
        }
        if let Some(description) = request.description {
            changes.insert("description".into(), json!(description.trim()));
        }
        if let Some(active) = request.active {
            changes.insert("active".into(), json!(active));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        let path = format!("/rest/v1/providers?id=eq.{}", current.id);
        let updated = self
            .db
            .update(&path, Value::Object(changes))
            .await?
            .ok_or(ProviderError::ProfileNotFound)?;

        info!("Provider {} profile updated", current.id);
        Ok(updated)
    }

    pub async fn activate(&self, user: &User) -> Result<Activation, ProviderError> {
        let mut rng = StdRng::from_entropy();
        self.activate_with_rng(user, &mut rng).await
    }

    /// Idempotent: a user who already has a provider gets it back unchanged.
    pub async fn activate_with_rng<R: Rng + Send>(
        &self,
        user: &User,
        rng: &mut R,
    ) -> Result<Activation, ProviderError> {
        if let Some(existing) = provider_for_user(&self.db, user.id).await? {
            debug!("User {} already has provider {}", user.id, existing.id);
            let provider = match existing.code {
                Some(_) => existing,
                None => self.assign_code(existing, rng).await?,
            };
            self.promote(user).await?;
            return Ok(Activation { provider, created: false });
        }

        let mut inserted = None;
        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let code = generate_unique_code(&self.db, rng).await?;
            let row = json!({
                "user_id": user.id,
                "name": "",
                "description": "",
                "code": code,
                "active": true,
            });

            match self.db.insert::<Provider>("providers", row).await {
                Ok(provider) => {
                    inserted = Some(provider);
                    break;
                }
                Err(e) if e.is_unique_violation() => {
                    if let Some(provider) = provider_for_user(&self.db, user.id).await? {
                        warn!("Concurrent activation for user {}: {}", user.id, e);
                        return Ok(Activation { provider, created: false });
                    }
                    warn!("Public code {} taken during insert (attempt {})", code, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let provider = inserted.ok_or_else(|| {
            ProviderError::Duplicate("Public code collision, please retry".to_string())
        })?;

        self.promote(user).await?;

        info!(
            "Activated provider {} for user {} with code {}",
            provider.id,
            user.id,
            provider.code.as_deref().unwrap_or_default()
        );
        Ok(Activation { provider, created: true })
    }

    async fn assign_code<R: Rng + Send>(
        &self,
        provider: Provider,
        rng: &mut R,
    ) -> Result<Provider, ProviderError> {
        let code = generate_unique_code(&self.db, rng).await?;
        let path = format!("/rest/v1/providers?id=eq.{}", provider.id);

        let updated = self
            .db
            .update(&path, json!({ "code": code }))
            .await?
            .unwrap_or(Provider {
                code: Some(code),
                ..provider
            });

        info!("Assigned public code to provider {}", updated.id);
        Ok(updated)
    }

    /// Clients become providers with an active subscription; admins keep their role.
    async fn promote(&self, user: &User) -> Result<(), ProviderError> {
        if user.role != UserRole::Client && user.subscription_active {
            return Ok(());
        }

        let role = match user.role {
            UserRole::Admin => UserRole::Admin,
            _ => UserRole::Provider,
        };

        let path = format!("/rest/v1/users?id=eq.{}&select=id", user.id);
        let _: Option<Value> = self
            .db
            .update(&path, json!({ "role": role, "subscription_active": true }))
            .await?;

        info!("User {} promoted to {}", user.id, role);
        Ok(())
    }
}
