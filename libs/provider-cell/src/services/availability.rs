use chrono::NaiveTime;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, PostgrestClient};
use shared_models::auth::User;
use shared_utils::datetime::parse_time;

use crate::models::{
    AvailabilityBlock, AvailabilityView, CreateAvailabilityRequest, ProviderError,
    UpdateAvailabilityRequest,
};
use crate::services::provider::require_provider;

const TIME_FORMAT: &str = "%H:%M:%S";

pub struct AvailabilityService {
    db: PostgrestClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn list_for_provider(
        &self,
        provider_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<AvailabilityBlock>, ProviderError> {
        let mut path = format!("/rest/v1/availability_blocks?provider_id=eq.{}", provider_id);
        if active_only {
            path.push_str("&active=is.true");
        }
        path.push_str("&order=day_of_week.asc,start_time.asc");

        Ok(self.db.select(&path).await?)
    }

    /// Active blocks rendered for a public booking page.
    pub async fn public_view(&self, provider_id: Uuid) -> Result<Vec<AvailabilityView>, ProviderError> {
        let blocks = self.list_for_provider(provider_id, true).await?;
        Ok(blocks.iter().map(AvailabilityView::from).collect())
    }

    pub async fn list_mine(&self, user: &User) -> Result<Vec<AvailabilityBlock>, ProviderError> {
        let provider = require_provider(&self.db, user).await?;
        self.list_for_provider(provider.id, false).await
    }

    pub async fn create(
        &self,
        user: &User,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailabilityBlock, ProviderError> {
        let provider = require_provider(&self.db, user).await?;

        let start = parse_block_time(&request.start_time, "start_time")?;
        let end = parse_block_time(&request.end_time, "end_time")?;
        validate_block(request.day_of_week, start, end)?;

        let row = json!({
            "provider_id": provider.id,
            "day_of_week": request.day_of_week,
            "start_time": start.format(TIME_FORMAT).to_string(),
            "end_time": end.format(TIME_FORMAT).to_string(),
            "active": request.active.unwrap_or(true),
        });

        let block: AvailabilityBlock = self
            .db
            .insert("availability_blocks", row)
            .await
            .map_err(duplicate_block)?;

        info!("Provider {} added availability block {}", provider.id, block.id);
        Ok(block)
    }

    pub async fn update(
        &self,
        user: &User,
        block_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<AvailabilityBlock, ProviderError> {
        let provider = require_provider(&self.db, user).await?;
        let path = format!(
            "/rest/v1/availability_blocks?id=eq.{}&provider_id=eq.{}",
            block_id, provider.id
        );

        let current: AvailabilityBlock = self
            .db
            .select_one(&path)
            .await?
            .ok_or(ProviderError::NotFound("Availability block"))?;

        let day = request.day_of_week.unwrap_or(current.day_of_week);
        let start = match &request.start_time {
            Some(raw) => parse_block_time(raw, "start_time")?,
            None => current.start_time,
        };
        let end = match &request.end_time {
            Some(raw) => parse_block_time(raw, "end_time")?,
            None => current.end_time,
        };
        validate_block(day, start, end)?;

        let changes = json!({
            "day_of_week": day,
            "start_time": start.format(TIME_FORMAT).to_string(),
            "end_time": end.format(TIME_FORMAT).to_string(),
            "active": request.active.unwrap_or(current.active),
        });

        let updated = self
            .db
            .update(&path, changes)
            .await
            .map_err(duplicate_block)?
            .ok_or(ProviderError::NotFound("Availability block"))?;

        info!("Availability block {} updated", block_id);
        Ok(updated)
    }

    pub async fn delete(&self, user: &User, block_id: Uuid) -> Result<(), ProviderError> {
        let provider = require_provider(&self.db, user).await?;
        let path = format!(
            "/rest/v1/availability_blocks?id=eq.{}&provider_id=eq.{}",
            block_id, provider.id
        );

        let existing: Option<AvailabilityBlock> = self.db.select_one(&path).await?;
        if existing.is_none() {
            return Err(ProviderError::NotFound("Availability block"));
        }

        self.db.delete(&path).await?;

        info!("Availability block {} deleted", block_id);
        Ok(())
    }
}

fn duplicate_block(err: DatabaseError) -> ProviderError {
    match err {
        DatabaseError::UniqueViolation(_) => {
            ProviderError::Duplicate("That availability block already exists".to_string())
        }
        other => ProviderError::Database(other),
    }
}

fn parse_block_time(raw: &str, field: &str) -> Result<NaiveTime, ProviderError> {
    parse_time(raw).ok_or_else(|| ProviderError::Validation(format!("Invalid {}: {}", field, raw)))
}

fn validate_block(day_of_week: i16, start: NaiveTime, end: NaiveTime) -> Result<(), ProviderError> {
    if !(0..=6).contains(&day_of_week) {
        return Err(ProviderError::Validation(
            "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
        ));
    }
    if start >= end {
        return Err(ProviderError::Validation("start_time must be before end_time".to_string()));
    }
    Ok(())
}
