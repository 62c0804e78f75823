use chrono::NaiveTime;
use serde::{Deserialize, Deserializer};
use std::io::Read;

use crate::workflows::visits::domain::{day_index, wall_clock};

#[derive(Debug)]
pub(crate) struct AvailabilityRow {
    pub(crate) line: u64,
    pub(crate) caregiver_id: String,
    pub(crate) day_of_week: Option<u8>,
    pub(crate) start_time: Option<NaiveTime>,
    pub(crate) end_time: Option<NaiveTime>,
    pub(crate) is_available: Option<bool>,
    pub(crate) raw_day: String,
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<AvailabilityRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for result in csv_reader.deserialize::<ScheduleRow>() {
        let row = result?;
        rows.push(AvailabilityRow {
            line: rows.len() as u64 + 2,
            caregiver_id: clean(&row.caregiver_id),
            day_of_week: parse_day(&row.day),
            start_time: row.start.as_deref().and_then(wall_clock::parse),
            end_time: row.end.as_deref().and_then(wall_clock::parse),
            is_available: match row.available.as_deref() {
                None => Some(true),
                Some(raw) => parse_flag(raw),
            },
            raw_day: row.day,
        });
    }

    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct ScheduleRow {
    #[serde(rename = "Caregiver ID")]
    caregiver_id: String,
    #[serde(rename = "Day")]
    day: String,
    #[serde(rename = "Start", default, deserialize_with = "empty_string_as_none")]
    start: Option<String>,
    #[serde(rename = "End", default, deserialize_with = "empty_string_as_none")]
    end: Option<String>,
    #[serde(rename = "Available", default, deserialize_with = "empty_string_as_none")]
    available: Option<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn clean(value: &str) -> String {
    value.replace(['\u{feff}', '\u{200b}'], "").trim().to_string()
}

/// Accepts `0`–`6` (Sunday first) or an English day name, full or abbreviated.
fn parse_day(value: &str) -> Option<u8> {
    let cleaned = clean(value);
    if let Ok(index) = cleaned.parse::<u8>() {
        return (index <= 6).then_some(index);
    }
    cleaned
        .parse::<chrono::Weekday>()
        .ok()
        .map(day_index)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn parse_day_for_tests(value: &str) -> Option<u8> {
    parse_day(value)
}
