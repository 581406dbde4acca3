use std::io::Write;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bucket::{WeekDir, file_name_for};
use crate::catalog::CatalogClient;
use crate::domain::ResourceRecord;
use crate::error::SyncError;
use crate::state::{StateEntry, StateMap, StateStore};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Report decisions without downloading or touching state.
    pub dry_run: bool,
    /// Replace an existing file when its state entry is for the same week
    /// but an older `last_modified`.
    pub refresh_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Downloaded,
    WouldDownload,
    SkippedNotFile,
    SkippedExists,
    SkippedUnchanged,
    /// No safe destination file name could be derived.
    SkippedUnnamed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutcome {
    pub resource: String,
    pub action: SyncAction,
    pub path: Option<String>,
    pub bytes: Option<u64>,
}

/// Per-resource skip/download decisions against the filesystem and state.
pub struct SyncExecutor<'a, C: CatalogClient + ?Sized> {
    client: &'a C,
    store: &'a StateStore,
    options: SyncOptions,
}

impl<'a, C: CatalogClient + ?Sized> SyncExecutor<'a, C> {
    pub fn new(client: &'a C, store: &'a StateStore, options: SyncOptions) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    /// Decides and performs the sync of one resource into `dir`.
    ///
    /// An existing file at the destination wins over whatever the state says.
    /// State is only written after the file is fully in place, and is saved
    /// to disk right away.
    pub fn sync_resource(
        &self,
        state: &mut StateMap,
        resource: &ResourceRecord,
        dir: &WeekDir,
        sink: &dyn ProgressSink,
    ) -> Result<ResourceOutcome, SyncError> {
        let resource_id = resource.id.as_str().to_string();

        if !resource.is_file() {
            debug!(resource = %resource.id, filetype = %resource.filetype, "not a file resource");
            sink.event(ProgressEvent::message(format!(
                "not a file resource: {} ({})",
                resource.id, resource.filetype
            )));
            return Ok(ResourceOutcome {
                resource: resource_id,
                action: SyncAction::SkippedNotFile,
                path: None,
                bytes: None,
            });
        }

        let Some(file_name) = file_name_for(resource) else {
            warn!(resource = %resource.id, "no usable file name");
            sink.event(ProgressEvent::message(format!(
                "no usable file name: {}",
                resource.id
            )));
            return Ok(ResourceOutcome {
                resource: resource_id,
                action: SyncAction::SkippedUnnamed,
                path: None,
                bytes: None,
            });
        };
        let destination = dir.path.join(&file_name);
        let last_modified = resource.last_modified.as_deref();
        let entry = state.get(&resource_id);
        let unchanged = entry
            .map(|entry| entry.matches(last_modified, dir.bucket))
            .unwrap_or(false);

        if destination.as_std_path().exists() {
            let stale_same_week = entry
                .map(|entry| entry.iso_week == dir.bucket.to_string() && !unchanged)
                .unwrap_or(false);
            if !(self.options.refresh_changed && stale_same_week) {
                sink.event(ProgressEvent::message(format!("exists: {file_name}")));
                return Ok(ResourceOutcome {
                    resource: resource_id,
                    action: SyncAction::SkippedExists,
                    path: Some(destination.to_string()),
                    bytes: None,
                });
            }
        } else if unchanged {
            sink.event(ProgressEvent::message(format!(
                "unchanged this week: {file_name}"
            )));
            return Ok(ResourceOutcome {
                resource: resource_id,
                action: SyncAction::SkippedUnchanged,
                path: Some(destination.to_string()),
                bytes: None,
            });
        }

        if self.options.dry_run {
            sink.event(ProgressEvent::message(format!("would download: {file_name}")));
            return Ok(ResourceOutcome {
                resource: resource_id,
                action: SyncAction::WouldDownload,
                path: Some(destination.to_string()),
                bytes: None,
            });
        }

        sink.event(ProgressEvent::message(format!("downloading: {file_name}")));
        let start = Instant::now();
        let bytes = self.download_atomic(resource, &destination)?;
        let elapsed = start.elapsed();
        info!(resource = %resource.id, path = %destination, bytes, "downloaded");
        sink.event(ProgressEvent {
            message: format!("saved to: {destination}"),
            elapsed: Some(elapsed),
        });

        state.insert(
            resource_id.clone(),
            StateEntry::new(resource.last_modified.clone(), dir.bucket),
        );
        self.store.save(state)?;

        Ok(ResourceOutcome {
            resource: resource_id,
            action: SyncAction::Downloaded,
            path: Some(destination.to_string()),
            bytes: Some(bytes),
        })
    }

    /// Streams into a temp file beside `destination` and renames it into
    /// place once complete. The temp file is removed on every error path.
    fn download_atomic(
        &self,
        resource: &ResourceRecord,
        destination: &Utf8Path,
    ) -> Result<u64, SyncError> {
        let parent = destination
            .parent()
            .ok_or_else(|| SyncError::Filesystem("invalid destination path".to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".cws-")
            .suffix(".part")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let bytes = self.client.download(&resource.url, temp.as_file_mut())?;
        temp.as_file_mut()
            .flush()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        temp.persist(destination.as_std_path())
            .map_err(|err| SyncError::Filesystem(err.error.to_string()))?;
        Ok(bytes)
    }
}
