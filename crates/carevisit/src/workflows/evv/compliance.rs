use std::collections::BTreeMap;
use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::config::EvvConfig;
use crate::workflows::visits::domain::{
    CaregiverId, EvvRecord, EvvRecordType, Visit, VisitId, VisitStatus,
};
use crate::workflows::visits::repository::DateRange;

/// Soft finding recorded against a visit. Findings never fail an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComplianceIssue {
    MissingClockIn,
    ClockInUnverified {
        distance_meters: Option<u32>,
        radius_meters: Option<u32>,
    },
    MissingClockOut,
    ClockOutUnverified {
        distance_meters: Option<u32>,
        radius_meters: Option<u32>,
    },
    LateStart {
        minutes: i64,
    },
    EarlyStart {
        minutes: i64,
    },
    DurationMismatch {
        actual_minutes: i64,
        expected_minutes: u32,
    },
    MissingSignature,
    ReportUnavailable {
        reason: String,
    },
}

fn location_message(event: &str, distance: Option<u32>, radius: Option<u32>) -> String {
    match (distance, radius) {
        (Some(distance), Some(radius)) => format!(
            "{event} location outside geofence (~{distance}m from patient home, limit {radius}m)"
        ),
        (Some(distance), None) => {
            format!("{event} location unverified (~{distance}m from patient home)")
        }
        _ => format!("{event} location could not be verified"),
    }
}

impl ComplianceIssue {
    pub fn message(&self) -> String {
        match self {
            ComplianceIssue::MissingClockIn => "Missing clock-in record".to_string(),
            ComplianceIssue::ClockInUnverified {
                distance_meters,
                radius_meters,
            } => location_message("Clock-in", *distance_meters, *radius_meters),
            ComplianceIssue::MissingClockOut => "Missing clock-out record".to_string(),
            ComplianceIssue::ClockOutUnverified {
                distance_meters,
                radius_meters,
            } => location_message("Clock-out", *distance_meters, *radius_meters),
            ComplianceIssue::LateStart { minutes } => {
                format!("Visit started ~{minutes} minutes late")
            }
            ComplianceIssue::EarlyStart { minutes } => {
                format!("Visit started ~{minutes} minutes early")
            }
            ComplianceIssue::DurationMismatch {
                actual_minutes,
                expected_minutes,
            } => format!(
                "Visit lasted {actual_minutes} minutes against {expected_minutes} scheduled"
            ),
            ComplianceIssue::MissingSignature => {
                "No caregiver or patient signature captured".to_string()
            }
            ComplianceIssue::ReportUnavailable { reason } => {
                format!("Compliance report unavailable: {reason}")
            }
        }
    }

    fn is_location(&self) -> bool {
        matches!(
            self,
            ComplianceIssue::MissingClockIn
                | ComplianceIssue::ClockInUnverified { .. }
                | ComplianceIssue::MissingClockOut
                | ComplianceIssue::ClockOutUnverified { .. }
        )
    }
}

/// Per-visit verdict. Built fresh on every request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub visit_id: VisitId,
    pub caregiver_id: Option<CaregiverId>,
    pub scheduled_date: Option<NaiveDate>,
    pub status: Option<VisitStatus>,
    pub clock_in_at: Option<NaiveDateTime>,
    pub clock_out_at: Option<NaiveDateTime>,
    pub is_compliant: bool,
    pub issues: Vec<ComplianceIssue>,
    pub messages: Vec<String>,
}

impl ComplianceReport {
    fn from_issues(
        visit_id: VisitId,
        visit: Option<&Visit>,
        clock_in_at: Option<NaiveDateTime>,
        clock_out_at: Option<NaiveDateTime>,
        issues: Vec<ComplianceIssue>,
    ) -> Self {
        Self {
            visit_id,
            caregiver_id: visit.and_then(|visit| visit.caregiver_id.clone()),
            scheduled_date: visit.map(|visit| visit.scheduled_date),
            status: visit.map(|visit| visit.status),
            clock_in_at,
            clock_out_at,
            is_compliant: issues.is_empty(),
            messages: issues.iter().map(ComplianceIssue::message).collect(),
            issues,
        }
    }

    /// Stand-in for a visit whose report could not be produced during a bulk run.
    pub fn unavailable(visit_id: VisitId, reason: impl Into<String>) -> Self {
        Self::from_issues(
            visit_id,
            None,
            None,
            None,
            vec![ComplianceIssue::ReportUnavailable {
                reason: reason.into(),
            }],
        )
    }
}

/// Independent issue flags used by range statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitFlags {
    pub location: bool,
    pub timing: bool,
    pub signature: bool,
}

impl VisitFlags {
    pub fn is_clean(&self) -> bool {
        !(self.location || self.timing || self.signature)
    }
}

/// Aggregate EVV figures for completed visits in a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvvStatistics {
    pub range: DateRange,
    pub caregiver_id: Option<CaregiverId>,
    pub total_visits: usize,
    pub compliant_visits: usize,
    pub location_issues: usize,
    pub timing_issues: usize,
    pub signature_issues: usize,
    /// Percentage with two decimals; zero when no visits completed.
    pub compliance_rate: f64,
    /// Every visit in the range grouped by status, not just completed ones.
    pub status_breakdown: BTreeMap<VisitStatus, usize>,
}

/// Chronologically first record of a type. Duplicates from retries are ignored.
pub(crate) fn first_of(records: &[EvvRecord], record_type: EvvRecordType) -> Option<&EvvRecord> {
    records
        .iter()
        .filter(|record| record.record_type == record_type)
        .min_by_key(|record| record.recorded_at)
}

/// Signed whole minutes, rounded to the nearest minute.
pub(crate) fn rounded_minutes(delta: chrono::Duration) -> i64 {
    (delta.num_seconds() as f64 / 60.0).round() as i64
}

/// Applies the EVV tolerances to visits and their verification records.
#[derive(Debug, Clone, Default)]
pub struct ComplianceEvaluator {
    config: EvvConfig,
}

impl ComplianceEvaluator {
    pub fn new(config: EvvConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvvConfig {
        &self.config
    }

    /// Collect every finding for the visit; checks never short-circuit.
    pub fn report(&self, visit: &Visit, records: &[EvvRecord]) -> ComplianceReport {
        let mut issues = Vec::new();
        let clock_in = first_of(records, EvvRecordType::ClockIn);
        let clock_out = first_of(records, EvvRecordType::ClockOut);

        match clock_in {
            None => issues.push(ComplianceIssue::MissingClockIn),
            Some(record) if !record.is_verified => issues.push(ComplianceIssue::ClockInUnverified {
                distance_meters: record.distance_from_home_meters,
                radius_meters: record.geofence_radius_meters,
            }),
            Some(_) => {}
        }

        match clock_out {
            None => issues.push(ComplianceIssue::MissingClockOut),
            Some(record) if !record.is_verified => {
                issues.push(ComplianceIssue::ClockOutUnverified {
                    distance_meters: record.distance_from_home_meters,
                    radius_meters: record.geofence_radius_meters,
                })
            }
            Some(_) => {}
        }

        if let Some(issue) = self.timing_issue(visit) {
            issues.push(issue);
        }
        if let Some(issue) = self.duration_issue(visit) {
            issues.push(issue);
        }
        if !visit.has_signature() {
            issues.push(ComplianceIssue::MissingSignature);
        }

        ComplianceReport::from_issues(
            visit.id.clone(),
            Some(visit),
            clock_in.map(|record| record.recorded_at),
            clock_out.map(|record| record.recorded_at),
            issues,
        )
    }

    pub fn flags(&self, visit: &Visit, records: &[EvvRecord]) -> VisitFlags {
        let verified = |record_type| {
            first_of(records, record_type)
                .map(|record| record.is_verified)
                .unwrap_or(false)
        };
        VisitFlags {
            location: !verified(EvvRecordType::ClockIn) || !verified(EvvRecordType::ClockOut),
            timing: self.timing_issue(visit).is_some(),
            signature: !visit.has_signature(),
        }
    }

    pub fn statistics<'a>(
        &self,
        range: DateRange,
        caregiver_id: Option<CaregiverId>,
        completed: impl IntoIterator<Item = (&'a Visit, &'a [EvvRecord])>,
        status_breakdown: BTreeMap<VisitStatus, usize>,
    ) -> EvvStatistics {
        let mut stats = EvvStatistics {
            range,
            caregiver_id,
            total_visits: 0,
            compliant_visits: 0,
            location_issues: 0,
            timing_issues: 0,
            signature_issues: 0,
            compliance_rate: 0.0,
            status_breakdown,
        };

        for (visit, records) in completed {
            let flags = self.flags(visit, records);
            stats.total_visits += 1;
            stats.location_issues += usize::from(flags.location);
            stats.timing_issues += usize::from(flags.timing);
            stats.signature_issues += usize::from(flags.signature);
            stats.compliant_visits += usize::from(flags.is_clean());
        }

        if stats.total_visits > 0 {
            let rate = stats.compliant_visits as f64 / stats.total_visits as f64 * 100.0;
            stats.compliance_rate = (rate * 100.0).round() / 100.0;
        }
        stats
    }

    fn timing_issue(&self, visit: &Visit) -> Option<ComplianceIssue> {
        let actual = visit.actual_start?;
        let drift = rounded_minutes(actual - visit.scheduled_start_at());
        if drift.abs() <= self.config.timing_tolerance_minutes {
            return None;
        }
        Some(if drift > 0 {
            ComplianceIssue::LateStart { minutes: drift }
        } else {
            ComplianceIssue::EarlyStart { minutes: -drift }
        })
    }

    fn duration_issue(&self, visit: &Visit) -> Option<ComplianceIssue> {
        let actual = visit.actual_duration_minutes?;
        let expected = visit.estimated_duration_minutes;
        if (actual - i64::from(expected)).abs() <= self.config.duration_tolerance_minutes {
            return None;
        }
        Some(ComplianceIssue::DurationMismatch {
            actual_minutes: actual,
            expected_minutes: expected,
        })
    }
}

#[derive(Serialize)]
struct ComplianceRow<'a> {
    visit_id: &'a str,
    caregiver_id: &'a str,
    scheduled_date: String,
    compliant: &'static str,
    issue_count: usize,
    location_issue: &'static str,
    issues: String,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Write one CSV row per report for billing audits.
pub fn write_compliance_csv<W: Write>(
    reports: &[ComplianceReport],
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for report in reports {
        csv_writer.serialize(ComplianceRow {
            visit_id: report.visit_id.as_str(),
            caregiver_id: report
                .caregiver_id
                .as_ref()
                .map(CaregiverId::as_str)
                .unwrap_or_default(),
            scheduled_date: report
                .scheduled_date
                .map(|date| date.to_string())
                .unwrap_or_default(),
            compliant: yes_no(report.is_compliant),
            issue_count: report.issues.len(),
            location_issue: yes_no(report.issues.iter().any(ComplianceIssue::is_location)),
            issues: report.messages.join("; "),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
