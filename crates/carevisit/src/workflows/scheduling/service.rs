use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::SchedulingConfig;
use super::import::{AvailabilityImportError, AvailabilityImporter};
use super::matching::{CaregiverMatch, MatchRequest, MatchingEngine};
use super::routing::{DailyRoute, RouteBuilder};
use crate::geo::{self, GeoPoint, ReportedLocation};
use crate::workflows::visits::domain::{
    day_index, wall_clock, Caregiver, CaregiverId, MileageEntry, MileageEntryId, PatientHomeId,
    VisitId, VisitStatus, WeeklyAvailabilitySlot,
};
use crate::workflows::visits::repository::{
    CaregiverFilter, DateRange, RepositoryError, VisitFilter, VisitRepository,
};

/// One day of a caregiver's recurring week, as submitted by schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: u8,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityImportSummary {
    pub caregivers_updated: Vec<CaregiverId>,
    pub slots_written: usize,
    pub unknown_caregivers: Vec<CaregiverId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtaOrigin {
    CurrentLocation,
    Home,
}

/// Single-hop estimate from the caregiver's last known position to a visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitEta {
    pub caregiver_id: CaregiverId,
    pub visit_id: VisitId,
    pub origin: EtaOrigin,
    pub distance_miles: f64,
    pub travel_minutes: u32,
}

/// Service composing the matcher, the route builder and the visit repository.
pub struct SchedulingService<R> {
    pub(super) repository: Arc<R>,
    pub(super) engine: MatchingEngine,
    pub(super) routes: RouteBuilder,
    pub(super) config: SchedulingConfig,
}

impl<R> SchedulingService<R>
where
    R: VisitRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: SchedulingConfig) -> Self {
        Self {
            repository,
            engine: MatchingEngine::new(config.matching.clone()),
            routes: RouteBuilder::new(config.route_average_speed_mph),
            config,
        }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Rank every active caregiver against the request, best first.
    pub fn find_matching_caregivers(
        &self,
        request: &MatchRequest,
    ) -> Result<Vec<CaregiverMatch>, SchedulingServiceError> {
        if request.duration_minutes == 0 {
            return Err(SchedulingServiceError::InvalidRequest(
                "duration_minutes must be positive".to_string(),
            ));
        }

        let weekday = day_index(request.date.weekday());
        let caregivers = self.repository.caregivers(&CaregiverFilter::matchable())?;
        let mut matches = Vec::new();

        for caregiver in &caregivers {
            let visits_on_date = self
                .repository
                .visits(&VisitFilter::on_date(request.date).for_caregiver(&caregiver.id))?;
            let window = self.repository.availability(&caregiver.id, weekday)?;

            match self
                .engine
                .evaluate(request, caregiver, &visits_on_date, window.as_ref())
            {
                Ok(candidate) => matches.push(candidate),
                Err(rejection) => debug!(
                    caregiver_id = %caregiver.id,
                    reason = %rejection.summary(),
                    "caregiver filtered out"
                ),
            }
        }

        debug!(
            visit_type = request.visit_type.label(),
            date = %request.date,
            considered = caregivers.len(),
            matched = matches.len(),
            "caregiver matching finished"
        );

        Ok(MatchingEngine::rank(matches))
    }

    /// Open start times for one caregiver on a date.
    pub fn available_slots(
        &self,
        caregiver_id: &CaregiverId,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Vec<NaiveTime>, SchedulingServiceError> {
        if duration_minutes == 0 {
            return Err(SchedulingServiceError::InvalidRequest(
                "duration_minutes must be positive".to_string(),
            ));
        }
        self.require_caregiver(caregiver_id)?;
        let window = self
            .repository
            .availability(caregiver_id, day_index(date.weekday()))?;
        let booked = self
            .repository
            .visits(&VisitFilter::on_date(date).for_caregiver(caregiver_id))?;

        Ok(self
            .engine
            .calculator()
            .open_slots(window.as_ref(), &booked, duration_minutes))
    }

    /// The caregiver's scheduled and confirmed visits for the date in clinical order.
    pub fn optimize_route(
        &self,
        caregiver_id: &CaregiverId,
        date: NaiveDate,
    ) -> Result<DailyRoute, SchedulingServiceError> {
        let caregiver = self.require_caregiver(caregiver_id)?;
        let visits = self.repository.visits(
            &VisitFilter::on_date(date)
                .for_caregiver(caregiver_id)
                .with_statuses(&[VisitStatus::Scheduled, VisitStatus::Confirmed]),
        )?;

        let mut home_locations: HashMap<PatientHomeId, Option<GeoPoint>> = HashMap::new();
        for visit in &visits {
            if home_locations.contains_key(&visit.patient_home_id) {
                continue;
            }
            let location = self
                .repository
                .patient_home(&visit.patient_home_id)?
                .and_then(|home| home.location);
            if location.is_none() {
                warn!(
                    visit_id = %visit.id,
                    patient_home_id = %visit.patient_home_id,
                    "patient home has no coordinates; leg counted as zero"
                );
            }
            home_locations.insert(visit.patient_home_id.clone(), location);
        }

        Ok(self.routes.build(&caregiver, date, &visits, &home_locations))
    }

    /// Delete the caregiver's weekly schedule and store `windows` in its place.
    pub fn replace_weekly_availability(
        &self,
        caregiver_id: &CaregiverId,
        windows: Vec<AvailabilityWindow>,
    ) -> Result<Vec<WeeklyAvailabilitySlot>, SchedulingServiceError> {
        self.require_caregiver(caregiver_id)?;

        let mut seen = BTreeSet::new();
        let mut slots = Vec::with_capacity(windows.len());
        for window in windows {
            if window.day_of_week > 6 {
                return Err(SchedulingServiceError::InvalidRequest(format!(
                    "day_of_week {} is outside 0-6",
                    window.day_of_week
                )));
            }
            if !seen.insert(window.day_of_week) {
                return Err(SchedulingServiceError::InvalidRequest(format!(
                    "day_of_week {} appears more than once",
                    window.day_of_week
                )));
            }
            if window.end_time <= window.start_time {
                return Err(SchedulingServiceError::InvalidRequest(format!(
                    "window for day {} ends before it starts",
                    window.day_of_week
                )));
            }
            slots.push(WeeklyAvailabilitySlot {
                caregiver_id: caregiver_id.clone(),
                day_of_week: window.day_of_week,
                start_time: window.start_time,
                end_time: window.end_time,
                is_available: window.is_available,
            });
        }
        slots.sort_by_key(|slot| slot.day_of_week);

        self.repository
            .replace_availability(caregiver_id, slots.clone())?;
        info!(caregiver_id = %caregiver_id, days = slots.len(), "weekly availability replaced");
        Ok(slots)
    }

    /// Replace schedules for every known caregiver found in a CSV export.
    pub fn import_weekly_availability<Rd: Read>(
        &self,
        reader: Rd,
    ) -> Result<AvailabilityImportSummary, SchedulingServiceError> {
        let schedules = AvailabilityImporter::from_reader(reader)?;
        let mut summary = AvailabilityImportSummary {
            caregivers_updated: Vec::new(),
            slots_written: 0,
            unknown_caregivers: Vec::new(),
        };

        for (caregiver_id, slots) in schedules {
            if self.repository.caregiver(&caregiver_id)?.is_none() {
                warn!(caregiver_id = %caregiver_id, "skipping schedule for unknown caregiver");
                summary.unknown_caregivers.push(caregiver_id);
                continue;
            }
            summary.slots_written += slots.len();
            self.repository.replace_availability(&caregiver_id, slots)?;
            summary.caregivers_updated.push(caregiver_id);
        }

        info!(
            updated = summary.caregivers_updated.len(),
            skipped = summary.unknown_caregivers.len(),
            "availability import applied"
        );
        Ok(summary)
    }

    /// Record a periodic position ping from the caregiver's device.
    pub fn update_caregiver_location(
        &self,
        caregiver_id: &CaregiverId,
        location: ReportedLocation,
        reported_at: NaiveDateTime,
    ) -> Result<Caregiver, SchedulingServiceError> {
        let mut caregiver = self.require_caregiver(caregiver_id)?;
        caregiver.current_location = Some(location.point());
        caregiver.location_updated_at = Some(reported_at);
        self.repository.update_caregiver(caregiver.clone())?;
        Ok(caregiver)
    }

    /// Estimated drive from the caregiver's last known position to the visit's home.
    pub fn next_visit_eta(
        &self,
        caregiver_id: &CaregiverId,
        visit_id: &VisitId,
    ) -> Result<VisitEta, SchedulingServiceError> {
        let caregiver = self.require_caregiver(caregiver_id)?;
        let visit = self
            .repository
            .visit(visit_id)?
            .ok_or_else(|| SchedulingServiceError::VisitNotFound(visit_id.clone()))?;
        let home = self
            .repository
            .patient_home(&visit.patient_home_id)?
            .ok_or_else(|| {
                SchedulingServiceError::PatientHomeNotFound(visit.patient_home_id.clone())
            })?;
        let destination = home
            .location
            .ok_or_else(|| SchedulingServiceError::MissingHomeCoordinates(home.id.clone()))?;

        let (origin, start) = match (caregiver.current_location, caregiver.home_location) {
            (Some(current), _) => (EtaOrigin::CurrentLocation, current),
            (None, Some(home_location)) => (EtaOrigin::Home, home_location),
            (None, None) => {
                return Err(SchedulingServiceError::MissingCaregiverLocation(
                    caregiver_id.clone(),
                ))
            }
        };

        let distance = geo::distance_miles(start, destination);
        Ok(VisitEta {
            caregiver_id: caregiver_id.clone(),
            visit_id: visit_id.clone(),
            origin,
            distance_miles: geo::round_to_hundredths(distance),
            travel_minutes: geo::estimated_travel_minutes(
                distance,
                self.config.eta_average_speed_mph,
            ),
        })
    }

    /// Build the day's route and log its distance as a reimbursable mileage entry.
    pub fn record_route_mileage(
        &self,
        caregiver_id: &CaregiverId,
        date: NaiveDate,
        rate_per_mile: Option<f64>,
    ) -> Result<MileageEntry, SchedulingServiceError> {
        let rate = match rate_per_mile {
            Some(rate) if rate.is_finite() && rate >= 0.0 => rate,
            Some(rate) => {
                return Err(SchedulingServiceError::InvalidRequest(format!(
                    "mileage rate {rate} must be a non-negative number"
                )))
            }
            None => self.config.mileage_rate_per_mile,
        };

        let route = self.optimize_route(caregiver_id, date)?;
        let entry = MileageEntry {
            id: MileageEntryId(Uuid::new_v4().to_string()),
            caregiver_id: caregiver_id.clone(),
            visit_id: None,
            date,
            distance_miles: route.total_distance_miles,
            rate_per_mile: rate,
            total_amount: MileageEntry::reimbursement(route.total_distance_miles, rate),
        };

        let stored = self.repository.insert_mileage(entry)?;
        info!(
            caregiver_id = %caregiver_id,
            %date,
            miles = stored.distance_miles,
            amount = stored.total_amount,
            "route mileage recorded"
        );
        Ok(stored)
    }

    pub fn mileage_entries(
        &self,
        caregiver_id: &CaregiverId,
        range: DateRange,
    ) -> Result<Vec<MileageEntry>, SchedulingServiceError> {
        Ok(self.repository.mileage_entries(caregiver_id, range)?)
    }

    pub(super) fn require_caregiver(
        &self,
        caregiver_id: &CaregiverId,
    ) -> Result<Caregiver, SchedulingServiceError> {
        self.repository
            .caregiver(caregiver_id)?
            .ok_or_else(|| SchedulingServiceError::CaregiverNotFound(caregiver_id.clone()))
    }
}

/// Error raised by the scheduling service.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingServiceError {
    #[error("caregiver {0} not found")]
    CaregiverNotFound(CaregiverId),
    #[error("visit {0} not found")]
    VisitNotFound(VisitId),
    #[error("patient home {0} not found")]
    PatientHomeNotFound(PatientHomeId),
    #[error("patient home {0} has no coordinates")]
    MissingHomeCoordinates(PatientHomeId),
    #[error("caregiver {0} has no known location")]
    MissingCaregiverLocation(CaregiverId),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Import(#[from] AvailabilityImportError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SchedulingServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CaregiverNotFound(_)
                | Self::VisitNotFound(_)
                | Self::PatientHomeNotFound(_)
                | Self::Repository(RepositoryError::NotFound)
        )
    }
}
