use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, PostgrestClient};
use shared_models::auth::User;

use crate::models::{
    CreateServiceRequest, ProviderError, Service, UpdateServiceRequest,
    DEFAULT_SERVICE_DURATION_MINUTES, MAX_SERVICE_DURATION_MINUTES,
};
use crate::services::provider::require_provider;

/// The services a provider offers.
pub struct CatalogService {
    db: PostgrestClient,
}

impl CatalogService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn list_for_provider(
        &self,
        provider_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Service>, ProviderError> {
        let mut path = format!("/rest/v1/services?provider_id=eq.{}", provider_id);
        if active_only {
            path.push_str("&active=is.true");
        }
        path.push_str("&order=name.asc");

        Ok(self.db.select(&path).await?)
    }

    /// A service only counts when it belongs to `provider_id`.
    pub async fn get_for_provider(
        &self,
        service_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Service>, ProviderError> {
        debug!("Looking up service {} of provider {}", service_id, provider_id);
        let path = format!(
            "/rest/v1/services?id=eq.{}&provider_id=eq.{}",
            service_id, provider_id
        );
        Ok(self.db.select_one(&path).await?)
    }

    pub async fn list_mine(&self, user: &User) -> Result<Vec<Service>, ProviderError> {
        let provider = require_provider(&self.db, user).await?;
        self.list_for_provider(provider.id, false).await
    }

    pub async fn create(&self, user: &User, request: CreateServiceRequest) -> Result<Service, ProviderError> {
        let provider = require_provider(&self.db, user).await?;

        let name = validate_name(&request.name)?;
        let duration = validate_duration(request.duration_minutes.unwrap_or(DEFAULT_SERVICE_DURATION_MINUTES))?;
        let price = validate_price(request.price.unwrap_or(0))?;

        let row = json!({
            "provider_id": provider.id,
            "name": name,
            "duration_minutes": duration,
            "price": price,
            "active": request.active.unwrap_or(true),
        });

        let service: Service = self
            .db
            .insert("services", row)
            .await
            .map_err(duplicate_name)?;

        info!("Provider {} added service {} ({})", provider.id, service.name, service.id);
        Ok(service)
    }

    pub async fn update(
        &self,
        user: &User,
        service_id: Uuid,
        request: UpdateServiceRequest,
    ) -> Result<Service, ProviderError> {
        let provider = require_provider(&self.db, user).await?;

        let mut changes = Map::new();
        if let Some(name) = &request.name {
            changes.insert("name".into(), json!(validate_name(name)?));
        }
        if let Some(duration) = request.duration_minutes {
            changes.insert("duration_minutes".into(), json!(validate_duration(duration)?));
        }
        if let Some(price) = request.price {
            changes.insert("price".into(), json!(validate_price(price)?));
        }
        if let Some(active) = request.active {
            changes.insert("active".into(), json!(active));
        }

        if changes.is_empty() {
            return self
                .get_for_provider(service_id, provider.id)
                .await?
                .ok_or(ProviderError::NotFound("Service"));
        }

        let path = format!(
            "/rest/v1/services?id=eq.{}&provider_id=eq.{}",
            service_id, provider.id
        );
        let updated = self
            .db
            .update(&path, Value::Object(changes))
            .await
            .map_err(duplicate_name)?
            .ok_or(ProviderError::NotFound("Service"))?;

        info!("Service {} updated", service_id);
        Ok(updated)
    }

    pub async fn delete(&self, user: &User, service_id: Uuid) -> Result<(), ProviderError> {
        let provider = require_provider(&self.db, user).await?;

        if self.get_for_provider(service_id, provider.id).await?.is_none() {
            return Err(ProviderError::NotFound("Service"));
        }

        let path = format!(
            "/rest/v1/services?id=eq.{}&provider_id=eq.{}",
            service_id, provider.id
        );
        self.db.delete(&path).await?;

        info!("Service {} deleted", service_id);
        Ok(())
    }
}

fn duplicate_name(err: DatabaseError) -> ProviderError {
    match err {
        DatabaseError::UniqueViolation(_) => {
            ProviderError::Duplicate("A service with that name already exists".to_string())
        }
        other => ProviderError::Database(other),
    }
}

fn validate_name(name: &str) -> Result<String, ProviderError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ProviderError::Validation("Service name is required".to_string()));
    }
    Ok(name.to_string())
}

fn validate_duration(minutes: i32) -> Result<i32, ProviderError> {
    if !(1..=MAX_SERVICE_DURATION_MINUTES).contains(&minutes) {
        return Err(ProviderError::Validation(format!(
            "Duration must be between 1 and {} minutes",
            MAX_SERVICE_DURATION_MINUTES
        )));
    }
    Ok(minutes)
}

fn validate_price(price: i64) -> Result<i64, ProviderError> {
    if price < 0 {
        return Err(ProviderError::Validation("Price cannot be negative".to_string()));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn service_field_validation() {
        assert_eq!(validate_name("  Haircut ").unwrap(), "Haircut");
        assert_matches!(validate_name("   "), Err(ProviderError::Validation(_)));
        assert!(validate_duration(1).is_ok());
        assert!(validate_duration(1440).is_ok());
        assert!(validate_duration(0).is_err());
        assert!(validate_duration(1441).is_err());
        assert!(validate_price(0).is_ok());
        assert!(validate_price(-1).is_err());
    }
}
