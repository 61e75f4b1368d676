//! Core domain types for the Doseline timeline engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Time values (calendar dates or day offsets)
//! - Delivery methods and table kinds
//! - Parsed and draft dose entries
//! - Display option enums (units, colour scheme, time mode)

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ============================================================================
// Time Values
// ============================================================================

/// The time cell of a dose entry.
///
/// Either a day offset (absolute, or a delta from the previous entry in
/// interval mode) or a calendar date string. Serialized untagged, so a
/// snapshot holds plain JSON numbers and strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Days(f64),
    Date(String),
}

impl TimeValue {
    /// Classify raw input text. Numbers win over dates; anything that is
    /// neither a finite number nor a valid calendar date yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(days) = parse_finite(text) {
            return Some(TimeValue::Days(days));
        }
        parse_calendar_date(text).map(|_| TimeValue::Date(text.to_string()))
    }

    pub fn as_days(&self) -> Option<f64> {
        match self {
            TimeValue::Days(days) => Some(*days),
            TimeValue::Date(_) => None,
        }
    }

    /// The instant a calendar value refers to (`None` for offsets and for
    /// strings that do not parse).
    pub fn calendar(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeValue::Days(_) => None,
            TimeValue::Date(s) => parse_calendar_date(s),
        }
    }

    /// `self - earlier` in days, when both values are of the same kind.
    pub fn days_since(&self, earlier: &TimeValue) -> Option<f64> {
        match (self, earlier) {
            (TimeValue::Days(a), TimeValue::Days(b)) => Some(a - b),
            (TimeValue::Date(_), TimeValue::Date(_)) => {
                let a = self.calendar()?;
                let b = earlier.calendar()?;
                Some((a - b).num_milliseconds() as f64 / MILLIS_PER_DAY)
            }
            _ => None,
        }
    }

    /// Move this value by `days`. Calendar values stay calendar values.
    pub fn shifted_by(&self, days: f64) -> Option<TimeValue> {
        match self {
            TimeValue::Days(d) => Some(TimeValue::Days(d + days)),
            TimeValue::Date(_) => {
                let shifted = self.calendar()?.checked_add_signed(days_to_delta(days)?)?;
                Some(TimeValue::Date(format_calendar_date(&shifted)))
            }
        }
    }
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeValue::Days(days) => write!(f, "{}", days),
            TimeValue::Date(s) => f.write_str(s),
        }
    }
}

/// Parse a finite real number, rejecting `inf`/`NaN` spellings.
pub fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a calendar date that carries at least year, month and day parts.
///
/// Accepted forms: `YYYY-MM-DD`, the same followed by `THH:MM[:SS]` or
/// ` HH:MM[:SS]` (read as UTC), and RFC 3339 timestamps.
pub fn parse_calendar_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.split('-').count() < 3 {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_calendar_date(dt: &DateTime<Utc>) -> String {
    if dt.num_seconds_from_midnight() == 0 {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

/// Convert fractional days into a chrono delta (millisecond precision).
pub fn days_to_delta(days: f64) -> Option<TimeDelta> {
    if !days.is_finite() {
        return None;
    }
    TimeDelta::try_milliseconds((days * MILLIS_PER_DAY).round() as i64)
}

// ============================================================================
// Delivery Methods
// ============================================================================

/// Delivery method (ester and route) of a dose
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryMethod {
    #[serde(rename = "EV im")]
    EvIm,
    #[serde(rename = "EEn im")]
    EenIm,
    #[serde(rename = "EC im")]
    EcIm,
    #[serde(rename = "EB im")]
    EbIm,
    #[serde(rename = "EUn im")]
    EunIm,
    #[serde(rename = "EUn casubq")]
    EunCasubq,
    #[serde(rename = "patch tw")]
    PatchTw,
    #[serde(rename = "patch ow")]
    PatchOw,
}

impl DeliveryMethod {
    /// Every method, in catalog order
    pub const ALL: [DeliveryMethod; 8] = [
        DeliveryMethod::EvIm,
        DeliveryMethod::EenIm,
        DeliveryMethod::EcIm,
        DeliveryMethod::EbIm,
        DeliveryMethod::EunIm,
        DeliveryMethod::EunCasubq,
        DeliveryMethod::PatchTw,
        DeliveryMethod::PatchOw,
    ];

    /// The catalog key, as stored in snapshots and CSV files
    pub fn key(self) -> &'static str {
        match self {
            DeliveryMethod::EvIm => "EV im",
            DeliveryMethod::EenIm => "EEn im",
            DeliveryMethod::EcIm => "EC im",
            DeliveryMethod::EbIm => "EB im",
            DeliveryMethod::EunIm => "EUn im",
            DeliveryMethod::EunCasubq => "EUn casubq",
            DeliveryMethod::PatchTw => "patch tw",
            DeliveryMethod::PatchOw => "patch ow",
        }
    }
}

impl Default for DeliveryMethod {
    fn default() -> Self {
        DeliveryMethod::ALL[0]
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ============================================================================
// Table and Option Types
// ============================================================================

/// Which regimen table an entry belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Explicit, non-repeating dose history
    Multidose,
    /// Independent repeating regimens, one per entry
    SteadyState,
}

/// How numeric time values are read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// Each value is a day offset from the regimen anchor
    #[default]
    Absolute,
    /// Each value is the gap since the previous entry
    Interval,
}

/// Colour scheme passed through to the curve engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    Day,
    #[default]
    Night,
}

impl ColorScheme {
    /// Day between 06:00 and 18:00, night otherwise
    pub fn for_hour(hour: u32) -> Self {
        if (6..18).contains(&hour) {
            ColorScheme::Day
        } else {
            ColorScheme::Night
        }
    }
}

/// Concentration unit of the rendered curves
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcentrationUnit {
    #[default]
    #[serde(rename = "pg/mL")]
    PgPerMl,
    #[serde(rename = "pmol/L")]
    PmolPerL,
}

impl ConcentrationUnit {
    /// Multiplier applied to pg/mL values
    pub fn scale(self) -> f64 {
        match self {
            ConcentrationUnit::PgPerMl => 1.0,
            ConcentrationUnit::PmolPerL => 3.6713,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConcentrationUnit::PgPerMl => "pg/mL",
            ConcentrationUnit::PmolPerL => "pmol/L",
        }
    }
}

// ============================================================================
// Entry Views
// ============================================================================

/// A validated dose entry: resolvable time, dose > 0
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedEntry {
    pub time: TimeValue,
    pub dose: f64,
    pub method: DeliveryMethod,
    pub curve_visible: Option<bool>,
    pub uncertainty_visible: Option<bool>,
}

impl ParsedEntry {
    pub fn new(time: TimeValue, dose: f64, method: DeliveryMethod) -> Self {
        Self {
            time,
            dose,
            method,
            curve_visible: None,
            uncertainty_visible: None,
        }
    }
}

/// Possibly incomplete entry content.
///
/// Used both as the input of `RegimenTable::add_entry` and as the raw read
/// of an entry that keeps incomplete cells (`None` where a cell does not
/// parse).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryDraft {
    pub time: Option<TimeValue>,
    pub dose: Option<f64>,
    pub method: Option<DeliveryMethod>,
    pub curve_visible: Option<bool>,
    pub uncertainty_visible: Option<bool>,
}

impl EntryDraft {
    pub fn new(time: TimeValue, dose: f64, method: DeliveryMethod) -> Self {
        Self {
            time: Some(time),
            dose: Some(dose),
            method: Some(method),
            curve_visible: None,
            uncertainty_visible: None,
        }
    }

    pub fn with_flags(mut self, curve_visible: bool, uncertainty_visible: bool) -> Self {
        self.curve_visible = Some(curve_visible);
        self.uncertainty_visible = Some(uncertainty_visible);
        self
    }
}

impl From<ParsedEntry> for EntryDraft {
    fn from(entry: ParsedEntry) -> Self {
        Self {
            time: Some(entry.time),
            dose: Some(entry.dose),
            method: Some(entry.method),
            curve_visible: entry.curve_visible,
            uncertainty_visible: entry.uncertainty_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_and_dates() {
        assert_eq!(TimeValue::parse("7"), Some(TimeValue::Days(7.0)));
        assert_eq!(TimeValue::parse(" -3.5 "), Some(TimeValue::Days(-3.5)));
        assert_eq!(
            TimeValue::parse("2024-01-10"),
            Some(TimeValue::Date("2024-01-10".into()))
        );
        assert_eq!(
            TimeValue::parse("2024-01-10T08:30"),
            Some(TimeValue::Date("2024-01-10T08:30".into()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(TimeValue::parse(""), None);
        assert_eq!(TimeValue::parse("NaN"), None);
        assert_eq!(TimeValue::parse("inf"), None);
        assert_eq!(TimeValue::parse("2024-01"), None);
        assert_eq!(TimeValue::parse("2024-02-30"), None);
        assert_eq!(TimeValue::parse("next tuesday"), None);
    }

    #[test]
    fn test_date_needs_three_components() {
        // slashes are not date separators
        assert!(parse_calendar_date("2024/01/10").is_none());
        assert!(parse_calendar_date("2024-01-10").is_some());
    }

    #[test]
    fn test_date_arithmetic() {
        let a = TimeValue::Date("2024-01-10".into());
        let b = TimeValue::Date("2024-01-03".into());
        assert_eq!(a.days_since(&b), Some(7.0));
        assert_eq!(a.shifted_by(7.0), Some(TimeValue::Date("2024-01-17".into())));
        assert_eq!(a.days_since(&TimeValue::Days(1.0)), None);
    }

    #[test]
    fn test_shift_keeps_time_of_day() {
        let morning = TimeValue::Date("2024-01-10T06:00".into());
        assert_eq!(
            morning.shifted_by(1.0),
            Some(TimeValue::Date("2024-01-11T06:00:00".into()))
        );

        let noon = TimeValue::Date("2024-01-10T12:00".into());
        assert_eq!(noon.shifted_by(0.5), Some(TimeValue::Date("2024-01-11".into())));
    }

    #[test]
    fn test_time_value_json_is_untagged() {
        let values = vec![TimeValue::Days(7.0), TimeValue::Date("2024-01-10".into())];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[7.0,"2024-01-10"]"#);
        let parsed: Vec<TimeValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, values);
    }

    #[test]
    fn test_method_keys_roundtrip_through_serde() {
        for method in DeliveryMethod::ALL {
            let json = serde_json::to_string(&method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.key()));
            let parsed: DeliveryMethod = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, method);
        }
    }

    #[test]
    fn test_color_scheme_for_hour() {
        assert_eq!(ColorScheme::for_hour(5), ColorScheme::Night);
        assert_eq!(ColorScheme::for_hour(6), ColorScheme::Day);
        assert_eq!(ColorScheme::for_hour(17), ColorScheme::Day);
        assert_eq!(ColorScheme::for_hour(18), ColorScheme::Night);
    }
}
