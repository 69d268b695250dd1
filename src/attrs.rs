//! Conversion of raw HDF attribute values into STAC property values.
//!
//! HEC-RAS writes most metadata as fixed-length strings, so booleans, datetimes and
//! time windows all arrive as text and are recognised here by shape.
use crate::error::Error;
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Number, Value};

pub type Properties = Map<String, Value>;

/// Attributes that are never carried into STAC properties.
const SKIPPED_ATTRS: &[&str] = &["Simulation Time Window"];

const RAS_DATETIME_SECONDS: &str = r"\d{2}\w{3}\d{4} \d{2}:\d{2}:\d{2}";
const RAS_DATETIME_MINUTES: &str = r"\d{2}\w{3}\d{4} \d{4}";

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Regex pattern should always compile")
}

lazy_static! {
    static ref PUNCTUATION: Regex = compile(r"[^\w\s]");
    static ref WHITESPACE: Regex = compile(r"\s+");
    /// `(single, window)` matchers for each RAS datetime shape.
    static ref RAS_DATETIMES: Vec<(Regex, Regex)> = [RAS_DATETIME_SECONDS, RAS_DATETIME_MINUTES]
        .into_iter()
        .map(|p| (compile(&format!("^{p}$")), compile(&format!("^{p} to {p}$"))))
        .collect();
}

/// An attribute as read from the file, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum HdfValue {
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<AttrValue>),
}

impl From<AttrValue> for Value {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(b),
            AttrValue::Int(i) => Value::Number(i.into()),
            AttrValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
            AttrValue::String(s) => Value::String(s),
            AttrValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
        }
    }
}

pub fn to_snake_case(text: &str) -> String {
    let text = PUNCTUATION.replace_all(text, "");
    let text = WHITESPACE.replace_all(&text, "_");
    text.to_lowercase()
}

/// Parses `ddMMMyyyy HH:MM:SS` or `ddMMMyyyy HHMM`.
///
/// RAS writes midnight at the end of a day as hour 24, which is rolled over to the
/// following day.
pub fn parse_ras_datetime(value: &str) -> Result<NaiveDateTime, Error> {
    let invalid = || Error::Datetime(value.to_string());

    let (date, time) = value.trim().split_once(' ').ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(date, "%d%b%Y").map_err(|_| invalid())?;

    let (time, rollover) = match time.strip_prefix("24") {
        Some(rest) => (format!("00{rest}"), true),
        None => (time.to_string(), false),
    };
    let time = NaiveTime::parse_from_str(&time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&time, "%H%M"))
        .map_err(|_| invalid())?;

    let datetime = date.and_time(time);
    if rollover {
        datetime.checked_add_days(Days::new(1)).ok_or_else(invalid)
    } else {
        Ok(datetime)
    }
}

/// Parses a window of the form `<datetime> to <datetime>`.
pub fn parse_time_window(window: &str) -> Result<(NaiveDateTime, NaiveDateTime), Error> {
    let (begin, end) = window
        .split_once(" to ")
        .ok_or_else(|| Error::Datetime(window.to_string()))?;
    Ok((parse_ras_datetime(begin)?, parse_ras_datetime(end)?))
}

/// Parses `HH:MM:SS` (seconds may be fractional) into a number of seconds.
pub fn parse_duration(duration: &str) -> Result<f64, Error> {
    let invalid = || Error::Duration(duration.to_string());

    let parts: Vec<&str> = duration.trim().split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return Err(invalid());
    };
    let hours: u64 = hours.parse().map_err(|_| invalid())?;
    let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;

    Ok((hours * 3600 + minutes * 60) as f64 + seconds)
}

pub fn to_iso(datetime: &NaiveDateTime) -> String {
    datetime.format(ISO_FORMAT).to_string()
}

pub fn convert_string(value: &str) -> AttrValue {
    match value {
        "True" => return AttrValue::Bool(true),
        "False" => return AttrValue::Bool(false),
        _ => {}
    }

    for (single, window) in RAS_DATETIMES.iter() {
        if window.is_match(value) {
            if let Ok((begin, end)) = parse_time_window(value) {
                return AttrValue::List(vec![
                    AttrValue::String(to_iso(&begin)),
                    AttrValue::String(to_iso(&end)),
                ]);
            }
        } else if single.is_match(value) {
            if let Ok(datetime) = parse_ras_datetime(value) {
                return AttrValue::String(to_iso(&datetime));
            }
        }
    }
    AttrValue::String(value.to_string())
}

fn collapse(mut items: Vec<AttrValue>) -> AttrValue {
    match items.len() {
        0 => AttrValue::Null,
        1 => items.remove(0),
        _ => AttrValue::List(items),
    }
}

fn convert_float(value: f64) -> AttrValue {
    if value.is_nan() {
        AttrValue::Null
    } else {
        AttrValue::Float(value)
    }
}

pub fn convert_value(value: HdfValue) -> AttrValue {
    let items = match value {
        HdfValue::Int(v) => v.into_iter().map(AttrValue::Int).collect(),
        HdfValue::UInt(v) => v
            .into_iter()
            .map(|u| i64::try_from(u).map_or(AttrValue::Float(u as f64), AttrValue::Int))
            .collect(),
        HdfValue::Float(v) => v.into_iter().map(convert_float).collect(),
        HdfValue::Bool(v) => v.into_iter().map(AttrValue::Bool).collect(),
        HdfValue::Str(v) => v.iter().map(|s| convert_string(s)).collect(),
    };
    collapse(items)
}

pub fn property_key(name: &str, prefix: Option<&str>) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", to_snake_case(prefix), to_snake_case(name)),
        None => to_snake_case(name),
    }
}

/// Converts a set of attributes into STAC properties, keyed `prefix:name` in snake case.
pub fn attrs_to_properties<I>(attrs: I, prefix: Option<&str>) -> Properties
where
    I: IntoIterator<Item = (String, HdfValue)>,
{
    attrs
        .into_iter()
        .filter(|(name, _)| !SKIPPED_ATTRS.contains(&name.as_str()))
        .map(|(name, value)| (property_key(&name, prefix), convert_value(value).into()))
        .collect()
}
