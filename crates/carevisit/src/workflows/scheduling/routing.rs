use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::geo::{self, GeoPoint};
use crate::workflows::visits::domain::{
    wall_clock, Caregiver, CaregiverId, PatientHomeId, Visit, VisitId,
};

/// One visit on a caregiver's day, with the leg that leads to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub sequence: usize,
    pub visit_id: VisitId,
    pub patient_home_id: PatientHomeId,
    pub location: Option<GeoPoint>,
    #[serde(with = "wall_clock")]
    pub scheduled_start: NaiveTime,
    #[serde(with = "wall_clock")]
    pub scheduled_end: NaiveTime,
    pub duration_minutes: u32,
    pub distance_from_previous_miles: f64,
    pub travel_minutes_from_previous: u32,
}

/// Chronological day plan with aggregate travel figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRoute {
    pub caregiver_id: CaregiverId,
    pub date: NaiveDate,
    pub stops: Vec<RouteStop>,
    pub total_distance_miles: f64,
    pub return_distance_miles: f64,
    pub total_travel_minutes: u32,
    pub total_duration_minutes: u32,
    #[serde(with = "wall_clock::option")]
    pub start_time: Option<NaiveTime>,
    #[serde(with = "wall_clock::option")]
    pub end_time: Option<NaiveTime>,
}

impl DailyRoute {
    pub fn empty(caregiver_id: CaregiverId, date: NaiveDate) -> Self {
        Self {
            caregiver_id,
            date,
            stops: Vec::new(),
            total_distance_miles: 0.0,
            return_distance_miles: 0.0,
            total_travel_minutes: 0,
            total_duration_minutes: 0,
            start_time: None,
            end_time: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }
}

/// Leg length in miles; a leg with either endpoint unknown counts as zero.
fn leg_miles(from: Option<GeoPoint>, to: Option<GeoPoint>) -> f64 {
    match (from, to) {
        (Some(from), Some(to)) => geo::distance_miles(from, to),
        _ => 0.0,
    }
}

/// Orders a day's visits by clinical schedule and totals the driving home→stops→home.
///
/// Ordering follows scheduled start times; the builder never reorders stops to shorten travel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteBuilder {
    average_speed_mph: f64,
}

impl RouteBuilder {
    pub fn new(average_speed_mph: f64) -> Self {
        Self { average_speed_mph }
    }

    /// `visits` should hold the caregiver's scheduled or confirmed visits for `date`; anything
    /// else is dropped. `home_locations` maps each patient home to its coordinates, if known.
    pub fn build(
        &self,
        caregiver: &Caregiver,
        date: NaiveDate,
        visits: &[Visit],
        home_locations: &HashMap<PatientHomeId, Option<GeoPoint>>,
    ) -> DailyRoute {
        let mut ordered: Vec<&Visit> = visits
            .iter()
            .filter(|visit| visit.scheduled_date == date && visit.status.is_planned())
            .collect();
        if ordered.is_empty() {
            return DailyRoute::empty(caregiver.id.clone(), date);
        }
        ordered.sort_by(|a, b| (a.scheduled_start, &a.id).cmp(&(b.scheduled_start, &b.id)));

        let mut stops = Vec::with_capacity(ordered.len());
        let mut previous = caregiver.home_location;
        let mut total_distance = 0.0;
        let mut visit_minutes = 0;

        for (index, visit) in ordered.iter().enumerate() {
            let location = home_locations
                .get(&visit.patient_home_id)
                .copied()
                .flatten();
            let leg = leg_miles(previous, location);
            total_distance += leg;
            visit_minutes += visit.estimated_duration_minutes;

            stops.push(RouteStop {
                sequence: index + 1,
                visit_id: visit.id.clone(),
                patient_home_id: visit.patient_home_id.clone(),
                location,
                scheduled_start: visit.scheduled_start,
                scheduled_end: visit.scheduled_end,
                duration_minutes: visit.estimated_duration_minutes,
                distance_from_previous_miles: geo::round_to_hundredths(leg),
                travel_minutes_from_previous: geo::estimated_travel_minutes(
                    leg,
                    self.average_speed_mph,
                ),
            });
            previous = location;
        }

        let return_leg = leg_miles(previous, caregiver.home_location);
        total_distance += return_leg;

        let total_travel_minutes =
            geo::estimated_travel_minutes(total_distance, self.average_speed_mph);

        DailyRoute {
            caregiver_id: caregiver.id.clone(),
            date,
            start_time: stops.first().map(|stop| stop.scheduled_start),
            end_time: stops.last().map(|stop| stop.scheduled_end),
            stops,
            total_distance_miles: geo::round_to_hundredths(total_distance),
            return_distance_miles: geo::round_to_hundredths(return_leg),
            total_travel_minutes,
            total_duration_minutes: visit_minutes + total_travel_minutes,
        }
    }
}
