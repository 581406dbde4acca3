#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Mutex;

use serde_json::{Value, json};

use catalog_week_sync::catalog::CatalogClient;
use catalog_week_sync::error::SyncError;

/// Replays scripted catalog pages per mirror URL; the last page repeats once
/// the script runs out.
#[derive(Default)]
pub struct MockCatalog {
    pages: Mutex<HashMap<String, VecDeque<Value>>>,
    datasets: HashMap<String, Value>,
    files: HashMap<String, Vec<u8>>,
    broken: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, ids: &[&str]) -> Self {
        let data: Vec<Value> = ids.iter().map(|id| json!({"id": id})).collect();
        self.page_value(url, json!({ "data": data }))
    }

    pub fn page_value(self, url: &str, document: Value) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(document);
        self
    }

    pub fn dataset(mut self, uri: &str, document: Value) -> Self {
        self.datasets.insert(uri.to_string(), document);
        self
    }

    pub fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Writes `partial` and then fails mid-stream.
    pub fn broken_file(mut self, url: &str, partial: &[u8]) -> Self {
        self.broken.insert(url.to_string(), partial.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl CatalogClient for MockCatalog {
    fn fetch_catalog(&self, url: &str) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(format!("catalog {url}"));
        let mut pages = self.pages.lock().unwrap();
        let queue = pages
            .get_mut(url)
            .ok_or_else(|| SyncError::CatalogHttp(format!("no script for {url}")))?;
        if queue.len() > 1 {
            Ok(queue.pop_front().unwrap())
        } else {
            queue
                .front()
                .cloned()
                .ok_or_else(|| SyncError::CatalogHttp(format!("empty script for {url}")))
        }
    }

    fn fetch_dataset(&self, uri: &str) -> Result<Value, SyncError> {
        self.calls.lock().unwrap().push(format!("dataset {uri}"));
        self.datasets
            .get(uri)
            .cloned()
            .ok_or_else(|| SyncError::CatalogStatus {
                status: 404,
                message: uri.to_string(),
            })
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SyncError> {
        self.calls.lock().unwrap().push(format!("download {url}"));
        if let Some(partial) = self.broken.get(url) {
            sink.write_all(partial).unwrap();
            return Err(SyncError::CatalogHttp(format!("connection reset: {url}")));
        }
        let bytes = self.files.get(url).ok_or_else(|| SyncError::CatalogStatus {
            status: 404,
            message: url.to_string(),
        })?;
        sink.write_all(bytes).unwrap();
        Ok(bytes.len() as u64)
    }
}

pub fn file_resource(id: &str, title: &str, url: &str, last_modified: &str) -> Value {
    json!({
        "id": id,
        "filetype": "file",
        "title": title,
        "url": url,
        "format": "csv",
        "last_modified": last_modified,
    })
}

pub fn dataset(id: &str, org: &str, last_modified: &str, resources: Vec<Value>) -> Value {
    json!({
        "id": id,
        "organization": {"name": org},
        "last_modified": last_modified,
        "resources": resources,
    })
}
