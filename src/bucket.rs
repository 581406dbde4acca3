use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{ResourceRecord, WeekBucket};
use crate::error::SyncError;

const QUOTES: &[char] = &['"', '\u{201C}', '\u{201D}', '\u{201E}'];

/// Organization and ISO-week folder for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekDir {
    pub organization: String,
    pub bucket: WeekBucket,
    pub path: Utf8PathBuf,
}

#[derive(Debug, Clone)]
pub struct BucketPlanner {
    base_path: Utf8PathBuf,
}

impl BucketPlanner {
    pub fn new(base_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Utf8Path {
        &self.base_path
    }

    /// `None` when the organization name normalizes to nothing.
    pub fn plan(
        &self,
        organization: &str,
        last_modified: &str,
    ) -> Result<Option<WeekDir>, SyncError> {
        let organization = normalize_org_name(organization);
        if organization.is_empty() {
            return Ok(None);
        }
        let bucket = WeekBucket::from_timestamp(last_modified)?;
        let path = self.base_path.join(&organization).join(bucket.to_string());
        Ok(Some(WeekDir {
            organization,
            bucket,
            path,
        }))
    }

    pub fn create(&self, dir: &WeekDir) -> Result<(), SyncError> {
        fs::create_dir_all(dir.path.as_std_path())
            .map_err(|err| SyncError::Filesystem(format!("create {}: {err}", dir.path)))
    }
}

/// Drops double quotes (ASCII and typographic) and surrounding whitespace,
/// then makes the result safe as a single path component.
pub fn normalize_org_name(raw: &str) -> String {
    let unquoted: String = raw.chars().filter(|ch| !QUOTES.contains(ch)).collect();
    sanitize_component(unquoted.trim()).unwrap_or_default()
}

/// Destination file name for a resource: its title, or `{id}.{format}` when
/// the title is blank.
pub fn file_name_for(resource: &ResourceRecord) -> Option<String> {
    if let Some(name) = sanitize_component(resource.title.trim()) {
        return Some(name);
    }
    let format = resource.format.trim().to_lowercase();
    let fallback = if format.is_empty() {
        resource.id.as_str().to_string()
    } else {
        format!("{}.{format}", resource.id)
    };
    sanitize_component(&fallback)
}

fn sanitize_component(value: &str) -> Option<String> {
    let cleaned: String = value
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}
