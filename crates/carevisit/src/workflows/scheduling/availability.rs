use chrono::NaiveTime;

use crate::workflows::visits::domain::{minutes_since_midnight, Visit, WeeklyAvailabilitySlot};

pub const DEFAULT_SLOT_INCREMENT_MINUTES: u32 = 30;

/// Finds open start times inside a caregiver's weekly window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityCalculator {
    increment_minutes: u32,
}

impl Default for AvailabilityCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_INCREMENT_MINUTES)
    }
}

impl AvailabilityCalculator {
    pub fn new(increment_minutes: u32) -> Self {
        let increment_minutes = if increment_minutes == 0 {
            DEFAULT_SLOT_INCREMENT_MINUTES
        } else {
            increment_minutes
        };
        Self { increment_minutes }
    }

    pub fn increment_minutes(&self) -> u32 {
        self.increment_minutes
    }

    /// Start times where a visit of `duration_minutes` fits the window without touching a booking.
    ///
    /// `window` is the schedule row for the target weekday; `None` or an unavailable row yields
    /// no slots. Cancelled, no-show and rescheduled visits in `booked` are ignored.
    pub fn open_slots(
        &self,
        window: Option<&WeeklyAvailabilitySlot>,
        booked: &[Visit],
        duration_minutes: u32,
    ) -> Vec<NaiveTime> {
        let Some(window) = window.filter(|window| window.is_available) else {
            return Vec::new();
        };

        let window_start = minutes_since_midnight(window.start_time);
        let window_end = minutes_since_midnight(window.end_time);

        let busy: Vec<(u32, u32)> = booked
            .iter()
            .filter(|visit| visit.status.occupies_schedule())
            .map(Visit::booked_minutes)
            .collect();

        let mut slots = Vec::new();
        let mut candidate_start = window_start;
        while let Some(candidate_end) = candidate_start
            .checked_add(duration_minutes)
            .filter(|&end| end <= window_end)
        {
            let conflicts = busy.iter().any(|&(existing_start, existing_end)| {
                candidate_start < existing_end && candidate_end > existing_start
            });

            if !conflicts {
                if let Some(time) = NaiveTime::from_hms_opt(
                    candidate_start / 60,
                    candidate_start % 60,
                    0,
                ) {
                    slots.push(time);
                }
            }

            match candidate_start.checked_add(self.increment_minutes) {
                Some(next) => candidate_start = next,
                None => break,
            }
        }

        slots
    }
}
