//! Shared visit domain and the storage port used by scheduling and EVV.

pub mod domain;
pub mod memory;
pub mod repository;

pub use domain::{
    Actor, ActorRole, Caregiver, CaregiverId, CaregiverStatus, DeviceMetadata, EvvRecord,
    EvvRecordId, EvvRecordType, InvalidTransition, MileageEntry, MileageEntryId, PatientHome,
    PatientHomeId, PatientId, TimeEntry, TimeEntryId, VerificationMethod, Visit, VisitId,
    VisitPriority, VisitStatus, VisitType, WeeklyAvailabilitySlot,
};
pub use memory::InMemoryVisitStore;
pub use repository::{
    CaregiverFilter, ClockInCommit, ClockOutCommit, DateRange, Page, PageRequest,
    RepositoryError, VisitFilter, VisitRepository,
};
