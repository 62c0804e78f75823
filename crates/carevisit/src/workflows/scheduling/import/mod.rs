//! Weekly availability import from scheduling-system CSV exports.
//!
//! Expected header: `Caregiver ID,Day,Start,End,Available`. `Available` is optional and
//! defaults to yes.

mod parser;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::workflows::visits::domain::{CaregiverId, WeeklyAvailabilitySlot};

#[derive(Debug)]
pub enum AvailabilityImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, message: String },
    DuplicateDay { caregiver_id: CaregiverId, day_of_week: u8 },
}

impl std::fmt::Display for AvailabilityImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityImportError::Io(err) => {
                write!(f, "failed to read availability export: {}", err)
            }
            AvailabilityImportError::Csv(err) => {
                write!(f, "invalid availability CSV data: {}", err)
            }
            AvailabilityImportError::InvalidRow { line, message } => {
                write!(f, "availability row {}: {}", line, message)
            }
            AvailabilityImportError::DuplicateDay {
                caregiver_id,
                day_of_week,
            } => write!(
                f,
                "caregiver {} has more than one row for day {}",
                caregiver_id, day_of_week
            ),
        }
    }
}

impl std::error::Error for AvailabilityImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AvailabilityImportError::Io(err) => Some(err),
            AvailabilityImportError::Csv(err) => Some(err),
            AvailabilityImportError::InvalidRow { .. }
            | AvailabilityImportError::DuplicateDay { .. } => None,
        }
    }
}

impl From<std::io::Error> for AvailabilityImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for AvailabilityImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Weekly schedules grouped per caregiver, ready for wholesale replacement.
pub type ImportedSchedules = BTreeMap<CaregiverId, Vec<WeeklyAvailabilitySlot>>;

pub struct AvailabilityImporter;

impl AvailabilityImporter {
    pub fn from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<ImportedSchedules, AvailabilityImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ImportedSchedules, AvailabilityImportError> {
        let mut schedules = ImportedSchedules::new();

        for row in parser::parse_rows(reader)? {
            let invalid = |message: String| AvailabilityImportError::InvalidRow {
                line: row.line,
                message,
            };

            if row.caregiver_id.is_empty() {
                return Err(invalid("missing caregiver id".to_string()));
            }
            let day_of_week = row
                .day_of_week
                .ok_or_else(|| invalid(format!("unrecognized day '{}'", row.raw_day)))?;
            let start_time = row
                .start_time
                .ok_or_else(|| invalid("start must be HH:MM".to_string()))?;
            let end_time = row
                .end_time
                .ok_or_else(|| invalid("end must be HH:MM".to_string()))?;
            let is_available = row
                .is_available
                .ok_or_else(|| invalid("available must be yes or no".to_string()))?;
            if end_time <= start_time {
                return Err(invalid(format!(
                    "end {} is not after start {}",
                    end_time.format("%H:%M"),
                    start_time.format("%H:%M")
                )));
            }

            let caregiver_id = CaregiverId::new(row.caregiver_id.clone());
            let slots = match schedules.entry(caregiver_id.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(Vec::new()),
            };
            if slots.iter().any(|slot| slot.day_of_week == day_of_week) {
                return Err(AvailabilityImportError::DuplicateDay {
                    caregiver_id,
                    day_of_week,
                });
            }
            slots.push(WeeklyAvailabilitySlot {
                caregiver_id,
                day_of_week,
                start_time,
                end_time,
                is_available,
            });
        }

        for slots in schedules.values_mut() {
            slots.sort_by_key(|slot| slot.day_of_week);
        }

        Ok(schedules)
    }
}
