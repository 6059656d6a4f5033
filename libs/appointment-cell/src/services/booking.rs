use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use provider_cell::services::provider::provider_for_user;
use provider_cell::{CatalogService, ProviderError, ProviderService, Service};
use shared_config::AppConfig;
use shared_database::{DatabaseError, PostgrestClient};
use shared_models::auth::User;
use shared_utils::datetime::{format_datetime, parse_datetime, parse_optional_bound};

use crate::models::{
    Appointment, AppointmentError, CreateAppointmentRequest, RangeQuery,
    UpdateAppointmentRequest, DEFAULT_APPOINTMENT_MINUTES,
};
use crate::services::conflict::{ConflictDetectionService, SlotKey};

pub struct BookingService {
    db: Arc<PostgrestClient>,
    conflicts: ConflictDetectionService,
    providers: ProviderService,
    catalog: CatalogService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let db = Arc::new(PostgrestClient::new(config));
        Self {
            conflicts: ConflictDetectionService::new(Arc::clone(&db)),
            providers: ProviderService::new(config),
            catalog: CatalogService::new(config),
            db,
        }
    }

    /// Books a slot for `caller`.
    pub async fn create(
        &self,
        caller: &User,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let provider_id = self
            .resolve_provider(request.provider_id, request.provider_code.as_deref())
            .await?;

        let start_at = required_start(request.start.as_deref())?;

        let service = match request.service_id {
            Some(service_id) => Some(self.service_of(service_id, provider_id).await?),
            None => None,
        };

        let end_at = resolve_end(start_at, request.end.as_deref(), service.as_ref())?;

        let key = SlotKey {
            provider_id,
            start_at,
            service_id: service.as_ref().map(|s| s.id),
        };

        if self.conflicts.slot_taken(&key, None).await? {
            return Err(AppointmentError::SlotTaken);
        }

        if self
            .conflicts
            .client_already_booked(caller.id, provider_id, &start_at)
            .await?
        {
            return Err(AppointmentError::AlreadyBooked);
        }

        let row = json!({
            "provider_id": provider_id,
            "service_id": key.service_id,
            "client_id": caller.id,
            "start_at": format_datetime(&start_at),
            "end_at": format_datetime(&end_at),
            "status": request.status.unwrap_or_default(),
            "applied_price": service.as_ref().map(|s| s.price),
            "client_name": non_blank(request.client_name).unwrap_or_else(|| caller.username.clone()),
            "client_contact": non_blank(request.client_contact).or_else(|| caller.email.clone()),
        });

        let appointment: Appointment = self
            .db
            .insert("appointments", row)
            .await
            .map_err(slot_violation)?;

        info!(
            "Booked appointment {} at provider {} for {} ({} - {})",
            appointment.id, provider_id, caller.id, appointment.start_at, appointment.end_at
        );
        Ok(appointment)
    }

    /// Reschedules or edits an appointment owned by the caller's provider
    /// or booked by the caller.
    pub async fn update(
        &self,
        caller: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self
            .find(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        self.authorize(caller, &current).await?;

        let new_start = match request.start.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_datetime(raw).ok_or_else(|| AppointmentError::InvalidStart(raw.to_string()))?,
            None => current.start_at,
        };
        let new_service_id = request.service_id.apply(current.service_id);

        let service_changed = new_service_id != current.service_id;
        let changed = new_start != current.start_at || service_changed;

        let service = match new_service_id {
            Some(service_id) if service_changed => Some(self.service_of(service_id, current.provider_id).await?),
            Some(service_id) if changed => self
                .catalog
                .get_for_provider(service_id, current.provider_id)
                .await?,
            _ => None,
        };

        let explicit_end = request.end.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let new_end = match explicit_end {
            Some(_) => resolve_end(new_start, explicit_end, None)?,
            None if changed => resolve_end(new_start, None, service.as_ref())?,
            None => current.end_at,
        };

        if changed {
            let key = SlotKey {
                provider_id: current.provider_id,
                start_at: new_start,
                service_id: new_service_id,
            };
            if self.conflicts.slot_taken(&key, Some(current.id)).await? {
                return Err(AppointmentError::SlotTaken);
            }
        }

        let mut changes = Map::new();
        changes.insert("start_at".into(), json!(format_datetime(&new_start)));
        changes.insert("end_at".into(), json!(format_datetime(&new_end)));
        changes.insert("service_id".into(), json!(new_service_id));
        if service_changed {
            changes.insert("applied_price".into(), json!(service.as_ref().map(|s| s.price)));
        }
        if let Some(status) = request.status {
            changes.insert("status".into(), json!(status));
        }
        if let Some(reason) = request.cancellation_reason {
            changes.insert("cancellation_reason".into(), json!(reason));
        }
        if let Some(name) = request.client_name {
            changes.insert("client_name".into(), json!(name));
        }
        if let Some(contact) = request.client_contact {
            changes.insert("client_contact".into(), json!(contact));
        }
        changes.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", current.id);
        let updated: Appointment = self
            .db
            .update(&path, Value::Object(changes))
            .await
            .map_err(slot_violation)?
            .ok_or(AppointmentError::NotFound)?;

        info!(
            "Updated appointment {} (start {} -> {}, service {:?} -> {:?})",
            updated.id, current.start_at, updated.start_at, current.service_id, updated.service_id
        );
        Ok(updated)
    }

    /// Hard delete. Unknown ids succeed.
    pub async fn delete(&self, caller: &User, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let Some(current) = self.find(appointment_id).await? else {
            debug!("Appointment {} already gone", appointment_id);
            return Ok(());
        };
        self.authorize(caller, &current).await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", current.id);
        self.db.delete(&path).await?;

        info!("Deleted appointment {} by {}", current.id, caller.id);
        Ok(())
    }

    pub async fn get(&self, caller: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .find(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;
        self.authorize(caller, &appointment).await?;
        Ok(appointment)
    }

    /// Appointments the caller booked, by start.
    pub async fn list_mine(&self, caller: &User, range: &RangeQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!("/rest/v1/appointments?client_id=eq.{}", caller.id);
        push_range(&mut path, range)?;
        path.push_str("&order=start_at.asc");

        Ok(self.db.select(&path).await?)
    }

    /// Appointments in the caller's provider calendar; empty for non-providers.
    pub async fn list_owner(&self, caller: &User, range: &RangeQuery) -> Result<Vec<Appointment>, AppointmentError> {
        let Some(provider) = provider_for_user(&self.db, caller.id).await? else {
            return Ok(Vec::new());
        };

        let mut path = format!("/rest/v1/appointments?provider_id=eq.{}", provider.id);
        push_range(&mut path, range)?;
        path.push_str("&order=start_at.asc");

        Ok(self.db.select(&path).await?)
    }

    async fn find(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.db.select_one(&path).await?)
    }

    async fn authorize(&self, caller: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
        if appointment.client_id == Some(caller.id) {
            return Ok(());
        }

        let owns_provider = provider_for_user(&self.db, caller.id)
            .await?
            .is_some_and(|provider| provider.id == appointment.provider_id);

        if owns_provider {
            Ok(())
        } else {
            warn!("User {} denied access to appointment {}", caller.id, appointment.id);
            Err(AppointmentError::Unauthorized)
        }
    }

    async fn resolve_provider(
        &self,
        provider_id: Option<Uuid>,
        provider_code: Option<&str>,
    ) -> Result<Uuid, AppointmentError> {
        if let Some(provider_id) = provider_id {
            return self
                .providers
                .find_by_id(provider_id)
                .await?
                .map(|provider| provider.id)
                .ok_or(AppointmentError::ProviderNotFound);
        }

        match provider_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => match self.providers.get_by_code(code).await {
                Ok(provider) => Ok(provider.id),
                Err(ProviderError::UnknownCode) => Err(AppointmentError::ProviderNotFound),
                Err(e) => Err(e.into()),
            },
            None => Err(AppointmentError::MissingProvider),
        }
    }

    async fn service_of(&self, service_id: Uuid, provider_id: Uuid) -> Result<Service, AppointmentError> {
        self.catalog
            .get_for_provider(service_id, provider_id)
            .await?
            .ok_or(AppointmentError::ServiceNotFound)
    }
}

fn required_start(raw: Option<&str>) -> Result<NaiveDateTime, AppointmentError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Err(AppointmentError::MissingStart),
        Some(value) => parse_datetime(value).ok_or_else(|| AppointmentError::InvalidStart(value.to_string())),
    }
}

/// Explicit end when given, otherwise start plus the service duration.
pub fn resolve_end(
    start_at: NaiveDateTime,
    explicit_end: Option<&str>,
    service: Option<&Service>,
) -> Result<NaiveDateTime, AppointmentError> {
    if let Some(raw) = explicit_end.map(str::trim).filter(|s| !s.is_empty()) {
        let end_at = parse_datetime(raw).ok_or_else(|| AppointmentError::InvalidEnd(raw.to_string()))?;
        if end_at <= start_at {
            return Err(AppointmentError::EndBeforeStart);
        }
        return Ok(end_at);
    }

    let minutes = service
        .map(|s| i64::from(s.duration_minutes))
        .unwrap_or(DEFAULT_APPOINTMENT_MINUTES);
    start_at
        .checked_add_signed(Duration::minutes(minutes))
        .ok_or_else(|| AppointmentError::InvalidStart(format_datetime(&start_at)))
}

pub(crate) fn push_range(path: &mut String, range: &RangeQuery) -> Result<(), AppointmentError> {
    let from = parse_optional_bound(range.from.as_deref(), "from").map_err(AppointmentError::InvalidRange)?;
    let to = parse_optional_bound(range.to.as_deref(), "to").map_err(AppointmentError::InvalidRange)?;

    if let Some(from) = from {
        path.push_str(&format!("&start_at=gte.{}", format_datetime(&from)));
    }
    if let Some(to) = to {
        path.push_str(&format!("&start_at=lte.{}", format_datetime(&to)));
    }
    Ok(())
}

fn slot_violation(err: DatabaseError) -> AppointmentError {
    match err {
        DatabaseError::UniqueViolation(msg) => {
            warn!("Storage rejected double booking: {}", msg);
            AppointmentError::SlotTaken
        }
        other => AppointmentError::Database(other),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
