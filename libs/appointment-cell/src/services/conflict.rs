use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::PostgrestClient;
use shared_utils::datetime::format_datetime;

use crate::models::AppointmentError;

/// Identity of a bookable slot. Two appointments collide when all three
/// parts are equal, with "no service" equal to itself.
///
/// A booking without a service is not matched on provider and start alone:
/// it only collides with other service-less bookings at that start, the same
/// key the `appointments_slot_key` unique index enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotKey {
    pub provider_id: Uuid,
    pub start_at: NaiveDateTime,
    pub service_id: Option<Uuid>,
}

impl SlotKey {
    /// PostgREST filter selecting appointments that hold this slot.
    pub fn query(&self, exclude_appointment_id: Option<Uuid>) -> String {
        let mut path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&start_at=eq.{}",
            self.provider_id,
            format_datetime(&self.start_at)
        );

        match self.service_id {
            Some(service_id) => path.push_str(&format!("&service_id=eq.{}", service_id)),
            None => path.push_str("&service_id=is.null"),
        }

        if let Some(id) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        path.push_str("&select=id&limit=1");
        path
    }
}

/// PostgREST filter for a client's own booking at a provider and start.
pub fn duplicate_intent_query(client_id: Uuid, provider_id: Uuid, start_at: &NaiveDateTime) -> String {
    format!(
        "/rest/v1/appointments?client_id=eq.{}&provider_id=eq.{}&start_at=eq.{}&select=id&limit=1",
        client_id,
        provider_id,
        format_datetime(start_at)
    )
}

/// Exact-timestamp slot checks. Interval overlap and availability windows
/// are not considered.
pub struct ConflictDetectionService {
    db: Arc<PostgrestClient>,
}

impl ConflictDetectionService {
    pub fn new(db: Arc<PostgrestClient>) -> Self {
        Self { db }
    }

    pub async fn slot_taken(
        &self,
        key: &SlotKey,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!(
            "Checking slot provider={} start={} service={:?}",
            key.provider_id, key.start_at, key.service_id
        );

        let holders: Vec<Value> = self.db.select(&key.query(exclude_appointment_id)).await?;
        if !holders.is_empty() {
            warn!("Slot {} at provider {} is already booked", key.start_at, key.provider_id);
        }
        Ok(!holders.is_empty())
    }

    pub async fn client_already_booked(
        &self,
        client_id: Uuid,
        provider_id: Uuid,
        start_at: &NaiveDateTime,
    ) -> Result<bool, AppointmentError> {
        let holders: Vec<Value> = self
            .db
            .select(&duplicate_intent_query(client_id, provider_id, start_at))
            .await?;

        if !holders.is_empty() {
            warn!("Client {} already booked provider {} at {}", client_id, provider_id, start_at);
        }
        Ok(!holders.is_empty())
    }
}
