use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::geo::{GeoPoint, ReportedLocation};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for caregivers.
    CaregiverId
);
string_id!(PatientId);
string_id!(PatientHomeId);
string_id!(
    /// Identifier wrapper for scheduled visits.
    VisitId
);
string_id!(EvvRecordId);
string_id!(TimeEntryId);
string_id!(MileageEntryId);

/// Serde adapter for `HH:MM` wall-clock strings.
pub mod wall_clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S>(value: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| {
            serde::de::Error::custom(format!("'{raw}' is not a HH:MM wall-clock time"))
        })
    }

    /// Optional variant used for route boundaries.
    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(time) => serializer.serialize_some(&time.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    super::parse(&raw).ok_or_else(|| {
                        serde::de::Error::custom(format!("'{raw}' is not a HH:MM wall-clock time"))
                    })
                })
                .transpose()
        }
    }

    /// Same format applied to every element of a list of start times.
    pub mod list {
        use chrono::NaiveTime;
        use serde::ser::SerializeSeq;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(values: &[NaiveTime], serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            let mut seq = serializer.serialize_seq(Some(values.len()))?;
            for value in values {
                seq.serialize_element(&value.format("%H:%M").to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Vec::<String>::deserialize(deserializer)?
                .iter()
                .map(|raw| {
                    super::parse(raw).ok_or_else(|| {
                        serde::de::Error::custom(format!("'{raw}' is not a HH:MM wall-clock time"))
                    })
                })
                .collect()
        }
    }
}

/// Minutes elapsed since midnight for a wall-clock time.
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaregiverStatus {
    Active,
    Inactive,
    OnLeave,
    Terminated,
}

impl CaregiverStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::OnLeave => "on_leave",
            Self::Terminated => "terminated",
        }
    }
}

/// Caregiver profile as seen by scheduling and EVV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caregiver {
    pub id: CaregiverId,
    pub name: String,
    pub home_location: Option<GeoPoint>,
    pub service_radius_miles: f64,
    pub max_daily_visits: u32,
    pub max_weekly_hours: u32,
    pub specialties: BTreeSet<String>,
    pub languages: BTreeSet<String>,
    pub status: CaregiverStatus,
    pub current_location: Option<GeoPoint>,
    pub location_updated_at: Option<NaiveDateTime>,
}

impl Caregiver {
    pub fn is_active(&self) -> bool {
        self.status == CaregiverStatus::Active
    }

    /// Best known position: the last ping, falling back to the home address.
    pub fn last_known_location(&self) -> Option<GeoPoint> {
        self.current_location.or(self.home_location)
    }
}

/// Registered residence where visits take place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientHome {
    pub id: PatientHomeId,
    pub patient_id: PatientId,
    pub address: String,
    pub location: Option<GeoPoint>,
    /// Per-home override of the agency-wide geofence radius.
    #[serde(default)]
    pub geofence_radius_meters: Option<u32>,
}

/// Day-of-week index where 0 is Sunday.
pub fn day_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Recurring weekly window, unique per (caregiver, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyAvailabilitySlot {
    pub caregiver_id: CaregiverId,
    pub day_of_week: u8,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

impl WeeklyAvailabilitySlot {
    pub fn applies_to(&self, date: NaiveDate) -> bool {
        self.day_of_week == day_index(date.weekday())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitType {
    SkilledNursing,
    PersonalCare,
    PhysicalTherapy,
    OccupationalTherapy,
    SpeechTherapy,
    Companion,
    Respite,
    Assessment,
}

impl VisitType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::SkilledNursing => "skilled_nursing",
            Self::PersonalCare => "personal_care",
            Self::PhysicalTherapy => "physical_therapy",
            Self::OccupationalTherapy => "occupational_therapy",
            Self::SpeechTherapy => "speech_therapy",
            Self::Companion => "companion",
            Self::Respite => "respite",
            Self::Assessment => "assessment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitPriority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Scheduled,
    Confirmed,
    EnRoute,
    Arrived,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl VisitStatus {
    pub const ALL: [Self; 9] = [
        Self::Scheduled,
        Self::Confirmed,
        Self::EnRoute,
        Self::Arrived,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
        Self::Rescheduled,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::EnRoute => "en_route",
            Self::Arrived => "arrived",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
            Self::Rescheduled => "rescheduled",
        }
    }

    /// Statuses a visit may move to from `self`.
    pub const fn allowed_transitions(self) -> &'static [VisitStatus] {
        use VisitStatus::*;
        match self {
            Scheduled => &[
                Confirmed,
                EnRoute,
                Arrived,
                Cancelled,
                NoShow,
                Rescheduled,
            ],
            Confirmed => &[EnRoute, Arrived, Cancelled, NoShow, Rescheduled],
            EnRoute => &[Arrived, Cancelled, NoShow],
            Arrived => &[InProgress, Completed],
            InProgress => &[Completed],
            Completed | Cancelled | NoShow | Rescheduled => &[],
        }
    }

    pub fn can_transition_to(self, next: VisitStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Cancelled | Self::NoShow | Self::Rescheduled
        )
    }

    /// Planned but not yet started; the statuses routes and daily caps look at.
    pub const fn is_planned(self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }

    /// Whether the visit still blocks time on the caregiver's calendar.
    pub const fn occupies_schedule(self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoShow | Self::Rescheduled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("visit cannot move from {} to {}", from.label(), to.label())]
pub struct InvalidTransition {
    pub from: VisitStatus,
    pub to: VisitStatus,
}

/// Scheduled in-home visit and the evidence captured while it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub patient_id: PatientId,
    pub patient_home_id: PatientHomeId,
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_date: NaiveDate,
    #[serde(with = "wall_clock")]
    pub scheduled_start: NaiveTime,
    #[serde(with = "wall_clock")]
    pub scheduled_end: NaiveTime,
    pub estimated_duration_minutes: u32,
    pub visit_type: VisitType,
    pub priority: VisitPriority,
    pub status: VisitStatus,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub actual_duration_minutes: Option<i64>,
    pub start_location: Option<ReportedLocation>,
    pub end_location: Option<ReportedLocation>,
    pub clinical_notes: Option<String>,
    pub caregiver_signature: Option<String>,
    pub patient_signature: Option<String>,
    pub signed_at: Option<NaiveDateTime>,
}

impl Visit {
    pub fn transition_to(&mut self, next: VisitStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Clock-out closes any visit still open, even one that was never clocked in.
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: VisitStatus::Completed,
            });
        }
        self.status = VisitStatus::Completed;
        Ok(())
    }

    pub fn scheduled_start_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_start)
    }

    /// Booked interval in minutes since midnight, half-open.
    pub fn booked_minutes(&self) -> (u32, u32) {
        (
            minutes_since_midnight(self.scheduled_start),
            minutes_since_midnight(self.scheduled_end),
        )
    }

    pub fn has_signature(&self) -> bool {
        self.caregiver_signature.is_some() || self.patient_signature.is_some()
    }

    pub fn is_assigned_to(&self, caregiver_id: &CaregiverId) -> bool {
        self.caregiver_id.as_ref() == Some(caregiver_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvvRecordType {
    ClockIn,
    ClockOut,
    LocationUpdate,
    TaskCompletion,
    SignatureCapture,
}

impl EvvRecordType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ClockIn => "clock_in",
            Self::ClockOut => "clock_out",
            Self::LocationUpdate => "location_update",
            Self::TaskCompletion => "task_completion",
            Self::SignatureCapture => "signature_capture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    Gps,
    ManualOverride,
}

/// Device metadata captured alongside each EVV fact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

/// Append-only verification fact. Only a manual override may rewrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvvRecord {
    pub id: EvvRecordId,
    pub visit_id: VisitId,
    pub caregiver_id: CaregiverId,
    pub record_type: EvvRecordType,
    pub recorded_at: NaiveDateTime,
    pub location: Option<ReportedLocation>,
    pub device: DeviceMetadata,
    pub distance_from_home_meters: Option<u32>,
    pub geofence_radius_meters: Option<u32>,
    pub verification_method: VerificationMethod,
    pub is_verified: bool,
    pub notes: Option<String>,
}

impl EvvRecord {
    pub fn append_note(&mut self, note: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.is_empty() => format!("{existing}\n{note}"),
            _ => note.to_string(),
        });
    }
}

/// Worked-time ledger row, open while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub caregiver_id: CaregiverId,
    pub visit_id: VisitId,
    pub started_at: NaiveDateTime,
    pub ended_at: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
    pub start_location: Option<ReportedLocation>,
    pub end_location: Option<ReportedLocation>,
}

impl TimeEntry {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Reimbursable travel record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MileageEntry {
    pub id: MileageEntryId,
    pub caregiver_id: CaregiverId,
    pub visit_id: Option<VisitId>,
    pub date: NaiveDate,
    pub distance_miles: f64,
    pub rate_per_mile: f64,
    pub total_amount: f64,
}

impl MileageEntry {
    pub fn reimbursement(distance_miles: f64, rate_per_mile: f64) -> f64 {
        ((distance_miles * rate_per_mile) * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Caregiver,
    Scheduler,
    Supervisor,
    Admin,
}

/// Pre-authenticated caller attached to every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_supervisor(&self) -> bool {
        matches!(self.role, ActorRole::Supervisor | ActorRole::Admin)
    }
}
