use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

use crate::error::SyncError;

/// Catalog identities arrive as either JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(Number),
}

impl From<RawId> for String {
    fn from(value: RawId) -> Self {
        match value {
            RawId::Text(text) => text,
            RawId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawId> for DatasetId {
    fn from(value: RawId) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<RawId> for ResourceId {
    fn from(value: RawId) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a dataset's resource list lives.
///
/// Some catalog responses carry the list inline; others replace it with a
/// nested object and expect the caller to follow the dataset `uri`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcesField {
    Inline(Vec<Value>),
    Indirect(String),
    MissingUri,
}

impl ResourcesField {
    fn from_parts(resources: Value, uri: Option<String>) -> Self {
        match resources {
            Value::Array(items) => ResourcesField::Inline(items),
            _ => match uri.filter(|uri| !uri.trim().is_empty()) {
                Some(uri) => ResourcesField::Indirect(uri),
                None => ResourcesField::MissingUri,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    id: DatasetId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    organization: Value,
    #[serde(default)]
    last_modified: Option<String>,
    #[serde(default)]
    resources: Value,
    #[serde(default)]
    uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    pub id: DatasetId,
    pub title: Option<String>,
    pub organization: Value,
    pub last_modified: Option<String>,
    pub resources: ResourcesField,
}

impl DatasetRecord {
    pub fn from_value(value: Value) -> Result<Self, SyncError> {
        let raw: RawDataset = serde_json::from_value(value)
            .map_err(|err| SyncError::CatalogShape(format!("dataset entry: {err}")))?;
        Ok(Self {
            id: raw.id,
            title: raw.title,
            organization: raw.organization,
            last_modified: raw.last_modified,
            resources: ResourcesField::from_parts(raw.resources, raw.uri),
        })
    }

    /// Raw organization name, `None` when the organization is not an object
    /// or carries no string name.
    pub fn organization_name(&self) -> Option<&str> {
        self.organization
            .as_object()
            .and_then(|org| org.get("name"))
            .and_then(|name| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub filetype: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub format: String,
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ResourceRecord {
    pub fn is_file(&self) -> bool {
        self.filetype == "file"
    }
}

/// Catalogs send `null` for unset text fields as often as they omit them.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One element of a resolved resource list.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEntry {
    Record(ResourceRecord),
    Malformed(String),
}

impl ResourceEntry {
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return ResourceEntry::Malformed("resource is not an object".to_string());
        }
        match serde_json::from_value::<ResourceRecord>(value) {
            Ok(record) => ResourceEntry::Record(record),
            Err(err) => ResourceEntry::Malformed(err.to_string()),
        }
    }
}

/// ISO calendar week, rendered as `{year}-W{week:02}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekBucket {
    year: i32,
    week: u32,
}

impl WeekBucket {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn from_timestamp(value: &str) -> Result<Self, SyncError> {
        parse_timestamp_date(value).map(Self::from_date)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn week(&self) -> u32 {
        self.week
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

impl FromStr for WeekBucket {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || SyncError::InvalidTimestamp(format!("week bucket {value}"));
        let (year, week) = value.trim().split_once("-W").ok_or_else(invalid)?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let week = week.parse::<u32>().map_err(|_| invalid())?;
        if !(1..=53).contains(&week) {
            return Err(invalid());
        }
        Ok(Self { year, week })
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Calendar date of an ISO-8601 timestamp, taken in the timestamp's own
/// offset. Naive timestamps are read as UTC.
pub fn parse_timestamp_date(value: &str) -> Result<NaiveDate, SyncError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.date_naive());
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc().date_naive());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| SyncError::InvalidTimestamp(value.to_string()))
}
