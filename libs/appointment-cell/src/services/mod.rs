pub mod booking;
pub mod conflict;
pub mod public;

pub use booking::BookingService;
pub use conflict::ConflictDetectionService;
pub use public::PublicAgendaService;
