//! Incremental mirror of an open-data catalog.
//!
//! Datasets are discovered by re-polling the catalog mirrors until the
//! expected number of distinct datasets has been seen, then every `file`
//! resource is stored under `BASE/{organization}/{year}-W{week}/{title}`.
//! A JSON state file remembers what was fetched so repeated runs only pull
//! what changed.

pub mod app;
pub mod bucket;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod output;
pub mod poller;
pub mod resolver;
pub mod state;
pub mod sync;
