use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Caregiver, CaregiverId, EvvRecord, EvvRecordId, MileageEntry, PatientHome, PatientHomeId,
    TimeEntry, Visit, VisitId, VisitStatus, WeeklyAvailabilitySlot,
};
use super::repository::{
    CaregiverFilter, ClockInCommit, ClockOutCommit, DateRange, Page, PageRequest,
    RepositoryError, VisitFilter, VisitRepository,
};

#[derive(Debug, Default)]
struct StoreState {
    caregivers: HashMap<CaregiverId, Caregiver>,
    homes: HashMap<PatientHomeId, PatientHome>,
    availability: HashMap<(CaregiverId, u8), WeeklyAvailabilitySlot>,
    visits: HashMap<VisitId, Visit>,
    evv_records: Vec<EvvRecord>,
    time_entries: Vec<TimeEntry>,
    mileage: Vec<MileageEntry>,
}

/// Process-local repository used by the demo server and the test suites.
///
/// Every trait call takes the single store lock, so the clock-in/clock-out commits are atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryVisitStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryVisitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }

    pub fn insert_caregiver(&self, caregiver: Caregiver) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.caregivers.contains_key(&caregiver.id) {
            return Err(RepositoryError::Conflict);
        }
        state.caregivers.insert(caregiver.id.clone(), caregiver);
        Ok(())
    }

    pub fn insert_patient_home(&self, home: PatientHome) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.homes.contains_key(&home.id) {
            return Err(RepositoryError::Conflict);
        }
        state.homes.insert(home.id.clone(), home);
        Ok(())
    }

    pub fn insert_visit(&self, visit: Visit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.visits.contains_key(&visit.id) {
            return Err(RepositoryError::Conflict);
        }
        state.visits.insert(visit.id.clone(), visit);
        Ok(())
    }

    pub fn time_entries(&self) -> Result<Vec<TimeEntry>, RepositoryError> {
        Ok(self.state()?.time_entries.clone())
    }
}

fn sorted_records(records: impl Iterator<Item = EvvRecord>) -> Vec<EvvRecord> {
    let mut records: Vec<EvvRecord> = records.collect();
    records.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at));
    records
}

impl VisitRepository for InMemoryVisitStore {
    fn caregiver(&self, id: &CaregiverId) -> Result<Option<Caregiver>, RepositoryError> {
        Ok(self.state()?.caregivers.get(id).cloned())
    }

    fn caregivers(&self, filter: &CaregiverFilter) -> Result<Vec<Caregiver>, RepositoryError> {
        let state = self.state()?;
        let mut caregivers: Vec<Caregiver> = state
            .caregivers
            .values()
            .filter(|caregiver| filter.matches(caregiver))
            .cloned()
            .collect();
        caregivers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(caregivers)
    }

    fn update_caregiver(&self, caregiver: Caregiver) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.caregivers.get_mut(&caregiver.id) {
            Some(existing) => {
                *existing = caregiver;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn patient_home(&self, id: &PatientHomeId) -> Result<Option<PatientHome>, RepositoryError> {
        Ok(self.state()?.homes.get(id).cloned())
    }

    fn availability(
        &self,
        caregiver_id: &CaregiverId,
        day_of_week: u8,
    ) -> Result<Option<WeeklyAvailabilitySlot>, RepositoryError> {
        Ok(self
            .state()?
            .availability
            .get(&(caregiver_id.clone(), day_of_week))
            .cloned())
    }

    fn replace_availability(
        &self,
        caregiver_id: &CaregiverId,
        slots: Vec<WeeklyAvailabilitySlot>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state
            .availability
            .retain(|(owner, _), _| owner != caregiver_id);
        for slot in slots {
            state
                .availability
                .insert((caregiver_id.clone(), slot.day_of_week), slot);
        }
        Ok(())
    }

    fn visit(&self, id: &VisitId) -> Result<Option<Visit>, RepositoryError> {
        Ok(self.state()?.visits.get(id).cloned())
    }

    fn visits(&self, filter: &VisitFilter) -> Result<Vec<Visit>, RepositoryError> {
        let state = self.state()?;
        let mut visits: Vec<Visit> = state
            .visits
            .values()
            .filter(|visit| filter.matches(visit))
            .cloned()
            .collect();
        visits.sort_by(|a, b| {
            (a.scheduled_date, a.scheduled_start, &a.id).cmp(&(
                b.scheduled_date,
                b.scheduled_start,
                &b.id,
            ))
        });
        Ok(visits)
    }

    fn update_visit(&self, visit: Visit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.visits.get_mut(&visit.id) {
            Some(existing) => {
                *existing = visit;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn upsert_visits(&self, visits: Vec<Visit>) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let count = visits.len();
        for visit in visits {
            state.visits.insert(visit.id.clone(), visit);
        }
        Ok(count)
    }

    fn count_visits_by_status(
        &self,
        filter: &VisitFilter,
    ) -> Result<BTreeMap<VisitStatus, usize>, RepositoryError> {
        let state = self.state()?;
        let mut counts = BTreeMap::new();
        for visit in state.visits.values().filter(|visit| filter.matches(visit)) {
            *counts.entry(visit.status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn evv_record(&self, id: &EvvRecordId) -> Result<Option<EvvRecord>, RepositoryError> {
        Ok(self
            .state()?
            .evv_records
            .iter()
            .find(|record| &record.id == id)
            .cloned())
    }

    fn evv_records(&self, visit_id: &VisitId) -> Result<Vec<EvvRecord>, RepositoryError> {
        let state = self.state()?;
        Ok(sorted_records(
            state
                .evv_records
                .iter()
                .filter(|record| &record.visit_id == visit_id)
                .cloned(),
        ))
    }

    fn evv_records_page(
        &self,
        visit_id: &VisitId,
        page: PageRequest,
    ) -> Result<Page<EvvRecord>, RepositoryError> {
        let records = self.evv_records(visit_id)?;
        Ok(Page::from_ordered(&records, page))
    }

    fn append_evv_record(&self, record: EvvRecord) -> Result<EvvRecord, RepositoryError> {
        let mut state = self.state()?;
        if state.evv_records.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        state.evv_records.push(record.clone());
        Ok(record)
    }

    fn update_evv_record(&self, record: EvvRecord) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state
            .evv_records
            .iter_mut()
            .find(|existing| existing.id == record.id)
        {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn open_time_entries(
        &self,
        caregiver_id: &CaregiverId,
        visit_id: &VisitId,
    ) -> Result<Vec<TimeEntry>, RepositoryError> {
        Ok(self
            .state()?
            .time_entries
            .iter()
            .filter(|entry| {
                entry.is_open()
                    && &entry.caregiver_id == caregiver_id
                    && &entry.visit_id == visit_id
            })
            .cloned()
            .collect())
    }

    fn commit_clock_in(&self, commit: ClockInCommit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.visits.contains_key(&commit.visit.id) {
            return Err(RepositoryError::NotFound);
        }
        let already_open = state.time_entries.iter().any(|entry| {
            entry.is_open()
                && entry.caregiver_id == commit.time_entry.caregiver_id
                && entry.visit_id == commit.time_entry.visit_id
        });
        if already_open {
            return Err(RepositoryError::Conflict);
        }

        state.visits.insert(commit.visit.id.clone(), commit.visit);
        state.evv_records.push(commit.record);
        state.time_entries.push(commit.time_entry);
        Ok(())
    }

    fn commit_clock_out(&self, commit: ClockOutCommit) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.visits.contains_key(&commit.visit.id) {
            return Err(RepositoryError::NotFound);
        }
        if let Some(closed) = &commit.closed_entry {
            if !state.time_entries.iter().any(|entry| entry.id == closed.id) {
                return Err(RepositoryError::NotFound);
            }
        }

        state.visits.insert(commit.visit.id.clone(), commit.visit);
        state.evv_records.push(commit.record);
        if let Some(closed) = commit.closed_entry {
            if let Some(entry) = state
                .time_entries
                .iter_mut()
                .find(|entry| entry.id == closed.id)
            {
                *entry = closed;
            }
        }
        Ok(())
    }

    fn insert_mileage(&self, entry: MileageEntry) -> Result<MileageEntry, RepositoryError> {
        let mut state = self.state()?;
        state.mileage.push(entry.clone());
        Ok(entry)
    }

    fn mileage_entries(
        &self,
        caregiver_id: &CaregiverId,
        range: DateRange,
    ) -> Result<Vec<MileageEntry>, RepositoryError> {
        Ok(self
            .state()?
            .mileage
            .iter()
            .filter(|entry| &entry.caregiver_id == caregiver_id && range.contains(entry.date))
            .cloned()
            .collect())
    }
}
