use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::matching::MatchRequest;
use super::service::{SchedulingService, SchedulingServiceError};
use crate::workflows::visits::domain::{CaregiverId, VisitId, VisitStatus};
use crate::workflows::visits::repository::{VisitFilter, VisitRepository};

/// Caregiver committed onto a visit by an auto-assign run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub visit_id: VisitId,
    pub caregiver_id: CaregiverId,
    pub score: f64,
    pub distance_miles: f64,
}

impl<R> SchedulingService<R>
where
    R: VisitRepository + 'static,
{
    /// Give every unassigned scheduled visit on `date` to its best-ranked caregiver.
    ///
    /// Visits without a match stay unassigned and are simply absent from the result.
    /// Assignments are committed one at a time, so later visits in the same run see the
    /// bookings made for earlier ones.
    pub fn auto_assign_caregivers(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Assignment>, SchedulingServiceError> {
        let pending = self.repository.visits(
            &VisitFilter::on_date(date)
                .with_statuses(&[VisitStatus::Scheduled])
                .unassigned(),
        )?;
        let mut assignments = Vec::new();

        for mut visit in pending {
            let Some(home) = self.repository.patient_home(&visit.patient_home_id)? else {
                warn!(
                    visit_id = %visit.id,
                    patient_home_id = %visit.patient_home_id,
                    "patient home missing; visit skipped"
                );
                continue;
            };
            let Some(patient_location) = home.location else {
                warn!(
                    visit_id = %visit.id,
                    patient_home_id = %home.id,
                    "patient home has no coordinates; visit skipped"
                );
                continue;
            };

            let request = MatchRequest {
                patient_location,
                visit_type: visit.visit_type,
                required_specialties: None,
                preferred_language: None,
                date,
                duration_minutes: visit.estimated_duration_minutes.max(1),
            };
            let Some(best) = self.find_matching_caregivers(&request)?.into_iter().next() else {
                continue;
            };

            visit.caregiver_id = Some(best.caregiver_id.clone());
            self.repository.update_visit(visit.clone())?;
            info!(
                visit_id = %visit.id,
                caregiver_id = %best.caregiver_id,
                score = best.score,
                "caregiver auto-assigned"
            );

            assignments.push(Assignment {
                visit_id: visit.id,
                caregiver_id: best.caregiver_id,
                score: best.score,
                distance_miles: best.distance_miles,
            });
        }

        info!(%date, assigned = assignments.len(), "auto-assign run finished");
        Ok(assignments)
    }
}
