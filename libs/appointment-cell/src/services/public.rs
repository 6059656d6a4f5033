use tracing::debug;
use uuid::Uuid;

use provider_cell::{AvailabilityService, CatalogService, Provider, ProviderError, ProviderService};
use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{Appointment, AppointmentError, PublicAgenda, PublicAppointment, RangeQuery};
use crate::services::booking::push_range;

/// Read-only view of a provider's booking page, addressed by public code.
pub struct PublicAgendaService {
    db: PostgrestClient,
    providers: ProviderService,
    catalog: CatalogService,
    availability: AvailabilityService,
}

impl PublicAgendaService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            providers: ProviderService::new(config),
            catalog: CatalogService::new(config),
            availability: AvailabilityService::new(config),
        }
    }

    pub async fn agenda_by_code(&self, code: &str, range: &RangeQuery) -> Result<PublicAgenda, AppointmentError> {
        let provider = self.provider_by_code(code).await?;

        let services = self.catalog.list_for_provider(provider.id, true).await?;
        let availability = self.availability.public_view(provider.id).await?;
        let appointments = self.booked_slots(provider.id, range).await?;

        debug!(
            "Agenda for {}: {} services, {} blocks, {} appointments",
            provider.id,
            services.len(),
            availability.len(),
            appointments.len()
        );

        Ok(PublicAgenda {
            provider,
            services,
            availability,
            appointments,
        })
    }

    pub async fn appointments_by_code(
        &self,
        code: &str,
        range: &RangeQuery,
    ) -> Result<Vec<PublicAppointment>, AppointmentError> {
        let provider = self.provider_by_code(code).await?;
        self.booked_slots(provider.id, range).await
    }

    async fn provider_by_code(&self, code: &str) -> Result<Provider, AppointmentError> {
        self.providers.get_by_code(code).await.map_err(|e| match e {
            ProviderError::UnknownCode => AppointmentError::ProviderNotFound,
            other => other.into(),
        })
    }

    /// Non-cancelled appointments by start, optionally bounded.
    async fn booked_slots(
        &self,
        provider_id: Uuid,
        range: &RangeQuery,
    ) -> Result<Vec<PublicAppointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&status=neq.cancelled",
            provider_id
        );
        push_range(&mut path, range)?;
        path.push_str("&order=start_at.asc");

        let appointments: Vec<Appointment> = self.db.select(&path).await?;
        Ok(appointments.into_iter().map(PublicAppointment::from).collect())
    }
}
