//! Electronic visit verification: geofenced clock-in/out, signatures and compliance reporting.

pub mod clock;
pub mod compliance;
pub mod config;
pub mod geofence;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compliance::{
    write_compliance_csv, ComplianceEvaluator, ComplianceIssue, ComplianceReport, EvvStatistics,
    VisitFlags,
};
pub use config::EvvConfig;
pub use geofence::GeofenceVerification;
pub use router::{evv_router, ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
pub use service::{
    ClockInOutcome, ClockInRequest, ClockOutOutcome, ClockOutRequest, EvvService, EvvServiceError,
    LocationUpdateOutcome, LocationUpdateRequest, SignatureOutcome, SignatureParty,
    SignatureRequest,
};
