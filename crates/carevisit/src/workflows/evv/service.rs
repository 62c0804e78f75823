use std::io::Write;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::{Clock, SystemClock};
use super::compliance::{
    rounded_minutes, write_compliance_csv, ComplianceEvaluator, ComplianceReport, EvvStatistics,
};
use super::config::EvvConfig;
use super::geofence::GeofenceVerification;
use crate::geo::ReportedLocation;
use crate::workflows::visits::domain::{
    Actor, ActorRole, CaregiverId, DeviceMetadata, EvvRecord, EvvRecordId, EvvRecordType,
    InvalidTransition, PatientHomeId, TimeEntry, TimeEntryId, VerificationMethod, Visit, VisitId,
    VisitStatus,
};
use crate::workflows::visits::repository::{
    ClockInCommit, ClockOutCommit, DateRange, Page, PageRequest, RepositoryError, VisitFilter,
    VisitRepository,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockInRequest {
    pub location: ReportedLocation,
    #[serde(default)]
    pub device: DeviceMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockOutRequest {
    pub location: ReportedLocation,
    #[serde(default)]
    pub device: DeviceMetadata,
    #[serde(default)]
    pub patient_signature: Option<String>,
    #[serde(default)]
    pub clinical_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdateRequest {
    pub location: ReportedLocation,
    #[serde(default)]
    pub device: DeviceMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureParty {
    Caregiver,
    Patient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub party: SignatureParty,
    pub signature: String,
    #[serde(default)]
    pub location: Option<ReportedLocation>,
    #[serde(default)]
    pub device: DeviceMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockInOutcome {
    pub visit: Visit,
    pub record: EvvRecord,
    pub time_entry: TimeEntry,
    pub verification: GeofenceVerification,
    /// Present when the fix fell outside the geofence; clock-in still succeeds.
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClockOutOutcome {
    pub visit: Visit,
    pub record: EvvRecord,
    pub closed_entry: Option<TimeEntry>,
    pub verification: GeofenceVerification,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationUpdateOutcome {
    pub record: EvvRecord,
    pub verification: GeofenceVerification,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureOutcome {
    pub visit: Visit,
    pub record: EvvRecord,
}

fn outside_warning(verification: &GeofenceVerification) -> Option<String> {
    (!verification.is_within_geofence).then(|| {
        format!(
            "Reported location is {}m from the patient home, outside the {}m geofence",
            verification.distance_from_home, verification.geofence_radius
        )
    })
}

/// Service recording electronic visit verification facts and reporting on them.
pub struct EvvService<R, C = SystemClock> {
    repository: Arc<R>,
    clock: Arc<C>,
    evaluator: ComplianceEvaluator,
    config: EvvConfig,
}

impl<R> EvvService<R, SystemClock>
where
    R: VisitRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: EvvConfig) -> Self {
        Self::with_clock(repository, config, Arc::new(SystemClock))
    }
}

impl<R, C> EvvService<R, C>
where
    R: VisitRepository + 'static,
    C: Clock + 'static,
{
    pub fn with_clock(repository: Arc<R>, config: EvvConfig, clock: Arc<C>) -> Self {
        Self {
            repository,
            clock,
            evaluator: ComplianceEvaluator::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EvvConfig {
        &self.config
    }

    /// Compare a GPS fix against the visit's patient home.
    pub fn verify_location(
        &self,
        visit_id: &VisitId,
        location: &ReportedLocation,
    ) -> Result<GeofenceVerification, EvvServiceError> {
        let visit = self.require_visit(visit_id)?;
        self.verify_for_visit(&visit, location)
    }

    /// Start the visit. A geofence miss is recorded unverified and returned as a warning.
    pub fn clock_in(
        &self,
        visit_id: &VisitId,
        actor: &Actor,
        request: ClockInRequest,
    ) -> Result<ClockInOutcome, EvvServiceError> {
        let mut visit = self.require_visit(visit_id)?;
        let caregiver_id = authorize(actor, &visit)?;
        let verification = self.verify_for_visit(&visit, &request.location)?;

        if !self
            .repository
            .open_time_entries(&caregiver_id, &visit.id)?
            .is_empty()
        {
            return Err(EvvServiceError::OpenTimeEntryExists(visit.id.clone()));
        }

        let now = self.clock.now();
        visit.transition_to(VisitStatus::Arrived)?;
        visit.actual_start = Some(now);
        visit.start_location = Some(request.location);

        let record = self.gps_record(
            &visit,
            &caregiver_id,
            EvvRecordType::ClockIn,
            request.location,
            request.device,
            verification,
        );
        let time_entry = TimeEntry {
            id: TimeEntryId(Uuid::new_v4().to_string()),
            caregiver_id: caregiver_id.clone(),
            visit_id: visit.id.clone(),
            started_at: now,
            ended_at: None,
            duration_minutes: None,
            start_location: Some(request.location),
            end_location: None,
        };

        self.repository
            .commit_clock_in(ClockInCommit {
                visit: visit.clone(),
                record: record.clone(),
                time_entry: time_entry.clone(),
            })
            .map_err(|error| match error {
                RepositoryError::Conflict => EvvServiceError::OpenTimeEntryExists(visit.id.clone()),
                other => EvvServiceError::Repository(other),
            })?;

        let warning = outside_warning(&verification);
        if warning.is_some() {
            warn!(
                visit_id = %visit.id,
                caregiver_id = %caregiver_id,
                distance_m = verification.distance_from_home,
                radius_m = verification.geofence_radius,
                "clock-in outside geofence"
            );
        }
        info!(visit_id = %visit.id, caregiver_id = %caregiver_id, "caregiver clocked in");

        Ok(ClockInOutcome {
            visit,
            record,
            time_entry,
            verification,
            warning,
        })
    }

    /// Complete the visit and close the caregiver's open time entry.
    pub fn clock_out(
        &self,
        visit_id: &VisitId,
        actor: &Actor,
        request: ClockOutRequest,
    ) -> Result<ClockOutOutcome, EvvServiceError> {
        let mut visit = self.require_visit(visit_id)?;
        let caregiver_id = authorize(actor, &visit)?;
        let verification = self.verify_for_visit(&visit, &request.location)?;

        let now = self.clock.now();
        visit.complete()?;
        visit.actual_end = Some(now);
        visit.actual_duration_minutes = visit
            .actual_start
            .map(|start| rounded_minutes(now - start));
        visit.end_location = Some(request.location);
        if let Some(signature) = request.patient_signature.filter(|s| !s.trim().is_empty()) {
            visit.patient_signature = Some(signature);
            visit.signed_at = Some(now);
        }
        if let Some(notes) = request.clinical_notes {
            visit.clinical_notes = Some(notes);
        }

        let record = self.gps_record(
            &visit,
            &caregiver_id,
            EvvRecordType::ClockOut,
            request.location,
            request.device,
            verification,
        );

        let closed_entry = self
            .repository
            .open_time_entries(&caregiver_id, &visit.id)?
            .into_iter()
            .next()
            .map(|mut entry| {
                entry.ended_at = Some(now);
                entry.duration_minutes = Some(rounded_minutes(now - entry.started_at));
                entry.end_location = Some(request.location);
                entry
            });
        if closed_entry.is_none() {
            warn!(
                visit_id = %visit.id,
                caregiver_id = %caregiver_id,
                "clock-out without an open time entry"
            );
        }

        self.repository.commit_clock_out(ClockOutCommit {
            visit: visit.clone(),
            record: record.clone(),
            closed_entry: closed_entry.clone(),
        })?;

        let warning = outside_warning(&verification);
        if warning.is_some() {
            warn!(
                visit_id = %visit.id,
                caregiver_id = %caregiver_id,
                distance_m = verification.distance_from_home,
                "clock-out outside geofence"
            );
        }
        info!(
            visit_id = %visit.id,
            caregiver_id = %caregiver_id,
            duration_min = visit.actual_duration_minutes,
            "caregiver clocked out"
        );

        Ok(ClockOutOutcome {
            visit,
            record,
            closed_entry,
            verification,
            warning,
        })
    }

    /// Log a mid-visit position and refresh the caregiver's last known location.
    pub fn record_location_update(
        &self,
        visit_id: &VisitId,
        actor: &Actor,
        request: LocationUpdateRequest,
    ) -> Result<LocationUpdateOutcome, EvvServiceError> {
        let visit = self.require_visit(visit_id)?;
        let caregiver_id = authorize(actor, &visit)?;
        let verification = self.verify_for_visit(&visit, &request.location)?;

        let record = self.repository.append_evv_record(self.gps_record(
            &visit,
            &caregiver_id,
            EvvRecordType::LocationUpdate,
            request.location,
            request.device,
            verification,
        ))?;

        let mut caregiver = self
            .repository
            .caregiver(&caregiver_id)?
            .ok_or_else(|| EvvServiceError::CaregiverNotFound(caregiver_id.clone()))?;
        caregiver.current_location = Some(request.location.point());
        caregiver.location_updated_at = Some(record.recorded_at);
        self.repository.update_caregiver(caregiver)?;

        Ok(LocationUpdateOutcome {
            record,
            verification,
        })
    }

    pub fn capture_signature(
        &self,
        visit_id: &VisitId,
        actor: &Actor,
        request: SignatureRequest,
    ) -> Result<SignatureOutcome, EvvServiceError> {
        if request.signature.trim().is_empty() {
            return Err(EvvServiceError::InvalidRequest(
                "signature must not be empty".to_string(),
            ));
        }
        let mut visit = self.require_visit(visit_id)?;
        let caregiver_id = authorize(actor, &visit)?;

        let verification = match &request.location {
            Some(location) => Some(self.verify_for_visit(&visit, location)?),
            None => None,
        };

        let now = self.clock.now();
        match request.party {
            SignatureParty::Caregiver => visit.caregiver_signature = Some(request.signature),
            SignatureParty::Patient => visit.patient_signature = Some(request.signature),
        }
        visit.signed_at = Some(now);

        let record = EvvRecord {
            id: EvvRecordId(Uuid::new_v4().to_string()),
            visit_id: visit.id.clone(),
            caregiver_id,
            record_type: EvvRecordType::SignatureCapture,
            recorded_at: now,
            location: request.location,
            device: request.device,
            distance_from_home_meters: verification.map(|v| v.distance_from_home),
            geofence_radius_meters: verification.map(|v| v.geofence_radius),
            verification_method: VerificationMethod::Gps,
            is_verified: verification.is_some_and(|v| v.is_within_geofence),
            notes: Some(match request.party {
                SignatureParty::Caregiver => "Caregiver signature captured".to_string(),
                SignatureParty::Patient => "Patient signature captured".to_string(),
            }),
        };

        self.repository.update_visit(visit.clone())?;
        let record = self.repository.append_evv_record(record)?;

        Ok(SignatureOutcome { visit, record })
    }

    pub fn generate_compliance_report(
        &self,
        visit_id: &VisitId,
    ) -> Result<ComplianceReport, EvvServiceError> {
        let visit = self.require_visit(visit_id)?;
        let records = self.repository.evv_records(&visit.id)?;
        Ok(self.evaluator.report(&visit, &records))
    }

    /// Reports for many visits; a visit that cannot be reported on yields a non-compliant stand-in.
    pub fn bulk_compliance_check(&self, visit_ids: &[VisitId]) -> Vec<ComplianceReport> {
        visit_ids
            .iter()
            .map(|visit_id| {
                self.generate_compliance_report(visit_id)
                    .unwrap_or_else(|error| {
                        warn!(visit_id = %visit_id, error = %error, "compliance report failed");
                        ComplianceReport::unavailable(visit_id.clone(), error.to_string())
                    })
            })
            .collect()
    }

    pub fn evv_statistics(
        &self,
        range: DateRange,
        caregiver_id: Option<&CaregiverId>,
    ) -> Result<EvvStatistics, EvvServiceError> {
        if range.end < range.start {
            return Err(EvvServiceError::InvalidRequest(format!(
                "range end {} precedes start {}",
                range.end, range.start
            )));
        }

        let mut filter = VisitFilter {
            scheduled: Some(range),
            ..VisitFilter::default()
        };
        if let Some(caregiver_id) = caregiver_id {
            filter = filter.for_caregiver(caregiver_id);
        }

        let status_breakdown = self.repository.count_visits_by_status(&filter)?;
        let completed = self
            .repository
            .visits(&filter.clone().with_statuses(&[VisitStatus::Completed]))?;
        let mut evidence = Vec::with_capacity(completed.len());
        for visit in &completed {
            evidence.push(self.repository.evv_records(&visit.id)?);
        }

        Ok(self.evaluator.statistics(
            range,
            caregiver_id.cloned(),
            completed
                .iter()
                .zip(evidence.iter())
                .map(|(visit, records)| (visit, records.as_slice())),
            status_breakdown,
        ))
    }

    /// EVV records for a visit, oldest first, one page at a time.
    pub fn evv_history(
        &self,
        visit_id: &VisitId,
        page: PageRequest,
    ) -> Result<Page<EvvRecord>, EvvServiceError> {
        self.require_visit(visit_id)?;
        Ok(self.repository.evv_records_page(visit_id, page)?)
    }

    /// Supervisor sign-off on a record. Location, timestamp and measured distance are kept.
    pub fn manual_override(
        &self,
        record_id: &EvvRecordId,
        reason: &str,
        actor: &Actor,
    ) -> Result<EvvRecord, EvvServiceError> {
        if !actor.is_supervisor() {
            return Err(EvvServiceError::Forbidden(format!(
                "{} may not override EVV records",
                actor.id
            )));
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(EvvServiceError::InvalidRequest(
                "override reason must not be empty".to_string(),
            ));
        }

        let mut record = self
            .repository
            .evv_record(record_id)?
            .ok_or_else(|| EvvServiceError::RecordNotFound(record_id.clone()))?;
        record.verification_method = VerificationMethod::ManualOverride;
        record.is_verified = true;
        record.append_note(&format!("Manual override by {}: {}", actor.id, reason));
        self.repository.update_evv_record(record.clone())?;

        info!(
            record_id = %record.id,
            visit_id = %record.visit_id,
            actor = %actor.id,
            "EVV record manually overridden"
        );
        Ok(record)
    }

    /// Write compliance reports for `visit_ids` as CSV.
    pub fn export_compliance_csv<W: Write>(
        &self,
        visit_ids: &[VisitId],
        writer: W,
    ) -> Result<usize, EvvServiceError> {
        let reports = self.bulk_compliance_check(visit_ids);
        write_compliance_csv(&reports, writer)?;
        Ok(reports.len())
    }

    fn require_visit(&self, visit_id: &VisitId) -> Result<Visit, EvvServiceError> {
        self.repository
            .visit(visit_id)?
            .ok_or_else(|| EvvServiceError::VisitNotFound(visit_id.clone()))
    }

    fn verify_for_visit(
        &self,
        visit: &Visit,
        location: &ReportedLocation,
    ) -> Result<GeofenceVerification, EvvServiceError> {
        let home = self
            .repository
            .patient_home(&visit.patient_home_id)?
            .ok_or_else(|| EvvServiceError::PatientHomeNotFound(visit.patient_home_id.clone()))?;
        let coordinates = home
            .location
            .ok_or_else(|| EvvServiceError::MissingHomeCoordinates(home.id.clone()))?;
        let radius = home
            .geofence_radius_meters
            .unwrap_or(self.config.default_geofence_radius_meters);

        Ok(GeofenceVerification::measure(coordinates, location, radius))
    }

    fn gps_record(
        &self,
        visit: &Visit,
        caregiver_id: &CaregiverId,
        record_type: EvvRecordType,
        location: ReportedLocation,
        device: DeviceMetadata,
        verification: GeofenceVerification,
    ) -> EvvRecord {
        EvvRecord {
            id: EvvRecordId(Uuid::new_v4().to_string()),
            visit_id: visit.id.clone(),
            caregiver_id: caregiver_id.clone(),
            record_type,
            recorded_at: self.clock.now(),
            location: Some(location),
            device,
            distance_from_home_meters: Some(verification.distance_from_home),
            geofence_radius_meters: Some(verification.geofence_radius),
            verification_method: VerificationMethod::Gps,
            is_verified: verification.is_within_geofence,
            notes: Some(verification.note()),
        }
    }
}

/// Resolve the caregiver a visit action is recorded for.
///
/// Caregivers may act only on their own visits; supervisors and admins act on behalf of the
/// assigned caregiver. Schedulers cannot record EVV facts.
fn authorize(actor: &Actor, visit: &Visit) -> Result<CaregiverId, EvvServiceError> {
    let assigned = visit
        .caregiver_id
        .clone()
        .ok_or_else(|| EvvServiceError::CaregiverNotAssigned {
            visit_id: visit.id.clone(),
            actor: actor.id.clone(),
        })?;

    match actor.role {
        ActorRole::Caregiver if assigned.as_str() == actor.id => Ok(assigned),
        ActorRole::Caregiver => Err(EvvServiceError::CaregiverNotAssigned {
            visit_id: visit.id.clone(),
            actor: actor.id.clone(),
        }),
        ActorRole::Supervisor | ActorRole::Admin => Ok(assigned),
        ActorRole::Scheduler => Err(EvvServiceError::Forbidden(format!(
            "{} may not record visit verification",
            actor.id
        ))),
    }
}

/// Error raised by the EVV service.
#[derive(Debug, thiserror::Error)]
pub enum EvvServiceError {
    #[error("visit {0} not found")]
    VisitNotFound(VisitId),
    #[error("patient home {0} not found")]
    PatientHomeNotFound(PatientHomeId),
    #[error("EVV record {0} not found")]
    RecordNotFound(EvvRecordId),
    #[error("caregiver {0} not found")]
    CaregiverNotFound(CaregiverId),
    #[error("patient home {0} has no coordinates; location cannot be verified")]
    MissingHomeCoordinates(PatientHomeId),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("{actor} is not the caregiver assigned to visit {visit_id}")]
    CaregiverNotAssigned { visit_id: VisitId, actor: String },
    #[error("visit {0} already has an open time entry")]
    OpenTimeEntryExists(VisitId),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to write compliance export: {0}")]
    Export(#[from] csv::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EvvServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::VisitNotFound(_)
                | Self::PatientHomeNotFound(_)
                | Self::RecordNotFound(_)
                | Self::CaregiverNotFound(_)
                | Self::Repository(RepositoryError::NotFound)
        )
    }
}
