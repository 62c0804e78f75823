use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    Caregiver, CaregiverId, CaregiverStatus, EvvRecord, EvvRecordId, MileageEntry, PatientHome,
    PatientHomeId, TimeEntry, Visit, VisitId, VisitStatus, WeeklyAvailabilitySlot,
};

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Filter for visit listings. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitFilter {
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled: Option<DateRange>,
    pub statuses: Option<Vec<VisitStatus>>,
    /// `Some(false)` keeps only visits with no caregiver assigned.
    pub assigned: Option<bool>,
}

impl VisitFilter {
    pub fn on_date(date: NaiveDate) -> Self {
        Self {
            scheduled: Some(DateRange::single(date)),
            ..Self::default()
        }
    }

    pub fn for_caregiver(mut self, caregiver_id: &CaregiverId) -> Self {
        self.caregiver_id = Some(caregiver_id.clone());
        self
    }

    pub fn with_statuses(mut self, statuses: &[VisitStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn unassigned(mut self) -> Self {
        self.assigned = Some(false);
        self
    }

    pub fn matches(&self, visit: &Visit) -> bool {
        if let Some(caregiver_id) = &self.caregiver_id {
            if visit.caregiver_id.as_ref() != Some(caregiver_id) {
                return false;
            }
        }
        if let Some(range) = &self.scheduled {
            if !range.contains(visit.scheduled_date) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&visit.status) {
                return false;
            }
        }
        if let Some(assigned) = self.assigned {
            if visit.caregiver_id.is_some() != assigned {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaregiverFilter {
    pub statuses: Option<Vec<CaregiverStatus>>,
    pub requires_home_location: bool,
}

impl CaregiverFilter {
    /// Active caregivers that can be measured against a patient address.
    pub fn matchable() -> Self {
        Self {
            statuses: Some(vec![CaregiverStatus::Active]),
            requires_home_location: true,
        }
    }

    pub fn matches(&self, caregiver: &Caregiver) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&caregiver.status) {
                return false;
            }
        }
        !(self.requires_home_location && caregiver.home_location.is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub per_page: usize,
}

impl PageRequest {
    pub const MAX_PER_PAGE: usize = 200;

    pub fn new(page: usize, per_page: usize) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.max(1) - 1) * self.per_page
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl<T: Clone> Page<T> {
    /// Slice an already ordered collection.
    pub fn from_ordered(items: &[T], request: PageRequest) -> Self {
        let items_on_page = items
            .iter()
            .skip(request.offset())
            .take(request.per_page)
            .cloned()
            .collect();
        Self {
            items: items_on_page,
            page: request.page,
            per_page: request.per_page,
            total: items.len(),
        }
    }
}

/// Everything clock-in writes; storage must apply it as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockInCommit {
    pub visit: Visit,
    pub record: EvvRecord,
    pub time_entry: TimeEntry,
}

/// Everything clock-out writes; storage must apply it as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockOutCommit {
    pub visit: Visit,
    pub record: EvvRecord,
    pub closed_entry: Option<TimeEntry>,
}

/// Storage port shared by the scheduling and EVV workflows.
///
/// List operations return visits ordered by scheduled date then start time, and EVV records
/// ordered by timestamp.
pub trait VisitRepository: Send + Sync {
    fn caregiver(&self, id: &CaregiverId) -> Result<Option<Caregiver>, RepositoryError>;
    fn caregivers(&self, filter: &CaregiverFilter) -> Result<Vec<Caregiver>, RepositoryError>;
    fn update_caregiver(&self, caregiver: Caregiver) -> Result<(), RepositoryError>;

    fn patient_home(&self, id: &PatientHomeId) -> Result<Option<PatientHome>, RepositoryError>;

    fn availability(
        &self,
        caregiver_id: &CaregiverId,
        day_of_week: u8,
    ) -> Result<Option<WeeklyAvailabilitySlot>, RepositoryError>;
    /// Delete every weekly slot for the caregiver and store `slots` in their place.
    fn replace_availability(
        &self,
        caregiver_id: &CaregiverId,
        slots: Vec<WeeklyAvailabilitySlot>,
    ) -> Result<(), RepositoryError>;

    fn visit(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError>;
    fn visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, RepositoryError>;
    fn update_visit(&self, visit: Visit) -> Result<(), RepositoryError>;
    /// Insert or replace each visit by id, returning how many were written.
    fn upsert_visits(&self, visits: Vec<Visit>) -> Result<usize, RepositoryError>;
    fn count_visits_by_status(
        &self,
        filter: &VisitFilter,
    ) -> Result<BTreeMap<VisitStatus, usize>, RepositoryError>;

    fn evv_record(&self, id: &EvvRecordId) -> Result<Option<EvvRecord>, RepositoryError>;
    fn evv_records(&self, visit_id: &VisitId) -> Result<Vec<EvvRecord>, RepositoryError>;
    fn evv_records_page(
        &self,
        visit_id: &VisitId,
        page: PageRequest,
    ) -> Result<Page<EvvRecord>, RepositoryError>;
    fn append_evv_record(&self, record: EvvRecord) -> Result<EvvRecord, RepositoryError>;
    /// Reserved for supervisor overrides; every other EVV write is an append.
    fn update_evv_record(&self, record: EvvRecord) -> Result<(), RepositoryError>;

    fn open_time_entries(
        &self,
        caregiver_id: &CaregiverId,
        visit_id: &VisitId,
    ) -> Result<Vec<TimeEntry>, RepositoryError>;

    fn commit_clock_in(&self, commit: ClockInCommit) -> Result<(), RepositoryError>;
    fn commit_clock_out(&self, commit: ClockOutCommit) -> Result<(), RepositoryError>;

    fn insert_mileage(&self, entry: MileageEntry) -> Result<MileageEntry, RepositoryError>;
    fn mileage_entries(
        &self,
        caregiver_id: &CaregiverId,
        range: DateRange,
    ) -> Result<Vec<MileageEntry>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_inputs() {
        let request = PageRequest::new(0, 10_000);
        assert_eq!(request.page, 1);
        assert_eq!(request.per_page, PageRequest::MAX_PER_PAGE);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn page_slices_ordered_items() {
        let items: Vec<u32> = (1..=7).collect();
        let page = Page::from_ordered(&items, PageRequest::new(2, 3));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);

        let last = Page::from_ordered(&items, PageRequest::new(3, 3));
        assert_eq!(last.items, vec![7]);
    }

    #[test]
    fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2025, 3, 31).expect("valid date");
        let range = DateRange::new(start, end);
        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end.succ_opt().expect("valid date")));
    }
}
