use serde::Serialize;
use tracing::{info, warn};

use crate::bucket::BucketPlanner;
use crate::catalog::CatalogClient;
use crate::config::ResolvedConfig;
use crate::domain::{DatasetRecord, ResourceEntry};
use crate::error::SyncError;
use crate::poller::{DatasetIndex, DedupPoller, PollPolicy};
use crate::resolver::{Resolution, ResourceResolver};
use crate::state::{StateMap, StateStore};
use crate::sync::{
    ProgressEvent, ProgressSink, ResourceOutcome, SyncAction, SyncExecutor, SyncOptions,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub poll_rounds: u32,
    pub datasets_discovered: usize,
    pub datasets_skipped: usize,
    pub downloaded: usize,
    pub would_download: usize,
    pub skipped_exists: usize,
    pub skipped_unchanged: usize,
    pub skipped_not_file: usize,
    pub malformed_resources: usize,
    pub bytes: u64,
    pub resources: Vec<ResourceOutcome>,
}

impl SyncReport {
    fn record(&mut self, outcome: ResourceOutcome) {
        match outcome.action {
            SyncAction::Downloaded => self.downloaded += 1,
            SyncAction::WouldDownload => self.would_download += 1,
            SyncAction::SkippedExists => self.skipped_exists += 1,
            SyncAction::SkippedUnchanged => self.skipped_unchanged += 1,
            SyncAction::SkippedNotFile => self.skipped_not_file += 1,
            SyncAction::SkippedUnnamed => self.malformed_resources += 1,
        }
        self.bytes += outcome.bytes.unwrap_or(0);
        self.resources.push(outcome);
    }

    /// One-line human summary. Dry-run decisions are reported apart from
    /// real downloads.
    pub fn summary_line(&self) -> String {
        let mut line = format!("done: {} downloaded", self.downloaded);
        if self.would_download > 0 {
            line.push_str(&format!(", {} would download", self.would_download));
        }
        line.push_str(&format!(
            ", {} existing, {} unchanged, {} not files, {} malformed, {} datasets skipped",
            self.skipped_exists,
            self.skipped_unchanged,
            self.skipped_not_file,
            self.malformed_resources,
            self.datasets_skipped
        ));
        line
    }
}

pub struct App<C: CatalogClient> {
    client: C,
    mirrors: Vec<String>,
    policy: PollPolicy,
    planner: BucketPlanner,
    store: StateStore,
}

impl<C: CatalogClient> App<C> {
    pub fn new(client: C, config: &ResolvedConfig) -> Self {
        Self {
            client,
            mirrors: config.mirrors.clone(),
            policy: config.poll,
            planner: BucketPlanner::new(config.base_path.clone()),
            store: StateStore::new(config.state_file.clone()),
        }
    }

    /// Discovers the catalog, then syncs every dataset in discovery order.
    ///
    /// Transport errors end the run; shape problems skip the offending
    /// dataset or resource.
    pub fn run(
        &self,
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        sink.event(ProgressEvent::message(format!(
            "polling {} mirrors for {} datasets",
            self.mirrors.len(),
            self.policy.target
        )));
        let mut index = DatasetIndex::new();
        let outcome =
            DedupPoller::new(&self.client, &self.mirrors, self.policy).poll(&mut index)?;
        report.poll_rounds = outcome.rounds;
        report.datasets_discovered = index.len();
        sink.event(ProgressEvent::message(format!(
            "found {} unique datasets in {} rounds",
            index.len(),
            outcome.rounds
        )));

        let mut state = self.store.load()?;
        for dataset in index.records() {
            if !self.sync_dataset(dataset, &mut state, options, &mut report, sink)? {
                report.datasets_skipped += 1;
            }
        }

        info!(
            downloaded = report.downloaded,
            skipped_exists = report.skipped_exists,
            skipped_unchanged = report.skipped_unchanged,
            "sync finished"
        );
        Ok(report)
    }

    /// Returns `false` when the dataset was skipped as a whole.
    fn sync_dataset(
        &self,
        dataset: &DatasetRecord,
        state: &mut StateMap,
        options: SyncOptions,
        report: &mut SyncReport,
        sink: &dyn ProgressSink,
    ) -> Result<bool, SyncError> {
        let Some(organization) = dataset.organization_name() else {
            warn!(dataset = %dataset.id, "organization is not an object with a name");
            sink.event(ProgressEvent::message(format!(
                "organization missing: dataset {}",
                dataset.id
            )));
            return Ok(false);
        };
        let Some(last_modified) = dataset.last_modified.as_deref() else {
            warn!(dataset = %dataset.id, "dataset has no last_modified");
            sink.event(ProgressEvent::message(format!(
                "last_modified missing: dataset {}",
                dataset.id
            )));
            return Ok(false);
        };

        let dir = match self.planner.plan(organization, last_modified) {
            Ok(Some(dir)) => dir,
            Ok(None) => {
                warn!(dataset = %dataset.id, organization, "organization name is empty");
                sink.event(ProgressEvent::message(format!(
                    "organization name empty: dataset {}",
                    dataset.id
                )));
                return Ok(false);
            }
            Err(SyncError::InvalidTimestamp(value)) => {
                warn!(dataset = %dataset.id, value = %value, "unparsable last_modified");
                sink.event(ProgressEvent::message(format!(
                    "invalid last_modified {value}: dataset {}",
                    dataset.id
                )));
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        if !options.dry_run {
            self.planner.create(&dir)?;
        }

        let entries = match ResourceResolver::new(&self.client).resolve(dataset)? {
            Resolution::Resources(entries) => entries,
            Resolution::Unavailable(reason) => {
                sink.event(ProgressEvent::message(reason.message()));
                return Ok(false);
            }
        };

        let executor = SyncExecutor::new(&self.client, &self.store, options);
        for entry in entries {
            match entry {
                ResourceEntry::Record(resource) => {
                    let outcome = executor.sync_resource(state, &resource, &dir, sink)?;
                    report.record(outcome);
                }
                ResourceEntry::Malformed(reason) => {
                    warn!(dataset = %dataset.id, reason = %reason, "malformed resource entry");
                    sink.event(ProgressEvent::message(format!(
                        "resource skipped in dataset {}: {reason}",
                        dataset.id
                    )));
                    report.malformed_resources += 1;
                }
            }
        }
        Ok(true)
    }
}
