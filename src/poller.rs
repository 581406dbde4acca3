use std::collections::HashMap;

use tracing::{info, warn};

use crate::catalog::{CatalogClient, fetch_datasets};
use crate::domain::{DatasetId, DatasetRecord};
use crate::error::SyncError;

/// When to stop re-polling the mirrors.
///
/// The catalog returns an unstable, growing result set with no pagination
/// cursor, so discovery repeats full passes until `target` distinct datasets
/// have been seen. With `max_rounds` and `stable_rounds` both unset the loop
/// never gives up: if the catalog never reaches `target` it spins forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub target: usize,
    /// Fail with `DiscoveryExhausted` after this many passes short of the target.
    pub max_rounds: Option<u32>,
    /// Accept a short result after this many consecutive passes with no new identity.
    pub stable_rounds: Option<u32>,
}

impl PollPolicy {
    pub fn until(target: usize) -> Self {
        Self {
            target,
            max_rounds: None,
            stable_rounds: None,
        }
    }
}

/// Identity-keyed dataset map that remembers first-seen order.
#[derive(Debug, Default)]
pub struct DatasetIndex {
    positions: HashMap<DatasetId, usize>,
    records: Vec<DatasetRecord>,
}

impl DatasetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites by identity. Returns `true` for a new identity.
    pub fn insert(&mut self, record: DatasetRecord) -> bool {
        match self.positions.get(&record.id) {
            Some(&position) => {
                self.records[position] = record;
                false
            }
            None => {
                self.positions.insert(record.id.clone(), self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &DatasetId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DatasetRecord> {
        self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub rounds: u32,
    pub reached_target: bool,
}

pub struct DedupPoller<'a, C: CatalogClient + ?Sized> {
    client: &'a C,
    mirrors: &'a [String],
    policy: PollPolicy,
}

impl<'a, C: CatalogClient + ?Sized> DedupPoller<'a, C> {
    pub fn new(client: &'a C, mirrors: &'a [String], policy: PollPolicy) -> Self {
        Self {
            client,
            mirrors,
            policy,
        }
    }

    /// Runs full passes over every mirror, merging into `index`, until the
    /// policy says stop. Any transport error aborts discovery.
    pub fn poll(&self, index: &mut DatasetIndex) -> Result<PollOutcome, SyncError> {
        let mut rounds = 0u32;
        let mut quiet_rounds = 0u32;
        loop {
            rounds += 1;
            let mut added = 0usize;
            for mirror in self.mirrors {
                for record in fetch_datasets(self.client, mirror)? {
                    if index.insert(record) {
                        added += 1;
                    }
                }
            }
            info!(
                round = rounds,
                added,
                unique = index.len(),
                target = self.policy.target,
                "catalog pass complete"
            );

            if index.len() >= self.policy.target {
                return Ok(PollOutcome {
                    rounds,
                    reached_target: true,
                });
            }

            quiet_rounds = if added == 0 { quiet_rounds + 1 } else { 0 };
            // Zero quiet rounds would accept a short result after any pass.
            if let Some(stable) = self.policy.stable_rounds.filter(|stable| *stable > 0) {
                if quiet_rounds >= stable {
                    warn!(
                        unique = index.len(),
                        target = self.policy.target,
                        "catalog stopped growing below target"
                    );
                    return Ok(PollOutcome {
                        rounds,
                        reached_target: false,
                    });
                }
            }
            if let Some(max) = self.policy.max_rounds {
                if rounds >= max {
                    return Err(SyncError::DiscoveryExhausted {
                        found: index.len(),
                        target: self.policy.target,
                        rounds,
                    });
                }
            }
        }
    }
}
