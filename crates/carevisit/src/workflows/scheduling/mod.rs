//! Caregiver matching, availability, daily routes and auto-assignment.

pub mod assignment;
pub mod availability;
pub mod config;
pub mod import;
pub mod matching;
pub mod router;
pub mod routing;
pub mod service;

#[cfg(test)]
mod tests;

pub use assignment::Assignment;
pub use availability::{AvailabilityCalculator, DEFAULT_SLOT_INCREMENT_MINUTES};
pub use config::SchedulingConfig;
pub use import::{AvailabilityImportError, AvailabilityImporter, ImportedSchedules};
pub use matching::{
    CaregiverMatch, MatchFactor, MatchRejection, MatchRequest, MatchingConfig, MatchingEngine,
    ScoreComponent,
};
pub use router::scheduling_router;
pub use routing::{DailyRoute, RouteBuilder, RouteStop};
pub use service::{
    AvailabilityImportSummary, AvailabilityWindow, EtaOrigin, SchedulingService,
    SchedulingServiceError, VisitEta,
};
