use std::io::Write;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Timeouts;
use crate::domain::DatasetRecord;
use crate::error::SyncError;

/// Network capabilities the sync engine needs: fetch JSON at a URL, and
/// stream bytes at a URL into a writer.
pub trait CatalogClient: Send + Sync {
    fn fetch_catalog(&self, url: &str) -> Result<Value, SyncError>;
    fn fetch_dataset(&self, uri: &str) -> Result<Value, SyncError>;
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SyncError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    timeouts: Timeouts,
    retries: usize,
}

impl CatalogHttpClient {
    pub fn new(timeouts: Timeouts, retries: usize) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("catalog-week-sync/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::CatalogHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|err| SyncError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            timeouts,
            retries,
        })
    }

    fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, SyncError> {
        debug!(url, "GET json");
        let response = self.send_with_retries(|| self.client.get(url).timeout(timeout))?;
        let response = Self::handle_status(response)?;
        let body = response
            .bytes()
            .map_err(|err| SyncError::CatalogHttp(format!("{url}: {err}")))?;
        decode_json(url, &body)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(SyncError::CatalogStatus { status, message })
    }

    fn send_with_retries<F>(&self, mut make_req: F) -> Result<reqwest::blocking::Response, SyncError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.retries && is_retryable_status(status) {
                        warn!(status, attempt, "retrying catalog request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.retries && is_retryable_error(&err) {
                        warn!(error = %err, attempt, "retrying catalog request");
                        thread::sleep(Duration::from_millis(BASE_DELAY_MS * (attempt as u64 + 1)));
                        attempt += 1;
                        continue;
                    }
                    return Err(SyncError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_catalog(&self, url: &str) -> Result<Value, SyncError> {
        self.get_json(url, self.timeouts.catalog)
    }

    fn fetch_dataset(&self, uri: &str) -> Result<Value, SyncError> {
        self.get_json(uri, self.timeouts.dataset)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64, SyncError> {
        let timeout = self.timeouts.download;
        let response = self.send_with_retries(|| self.client.get(url).timeout(timeout))?;
        let mut response = Self::handle_status(response)?;
        std::io::copy(&mut response, sink)
            .map_err(|err| SyncError::CatalogHttp(format!("streaming {url}: {err}")))
    }
}

/// Single fetch of one catalog endpoint, normalized into dataset records.
///
/// A response without a `data` list is fatal; entries that lack an identity
/// are dropped with a warning.
pub fn fetch_datasets<C: CatalogClient + ?Sized>(
    client: &C,
    url: &str,
) -> Result<Vec<DatasetRecord>, SyncError> {
    let document = client.fetch_catalog(url)?;
    let entries = match document {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(SyncError::CatalogShape(format!(
                    "{url}: `data` is missing or not a list"
                )));
            }
        },
        _ => {
            return Err(SyncError::CatalogShape(format!(
                "{url}: response is not an object"
            )));
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match DatasetRecord::from_value(entry) {
            Ok(record) => records.push(record),
            Err(err) => warn!(url, error = %err, "skipping catalog entry"),
        }
    }
    Ok(records)
}

/// A 2xx body that is not JSON is a shape problem, not a transport one.
fn decode_json(url: &str, body: &[u8]) -> Result<Value, SyncError> {
    serde_json::from_slice(body)
        .map_err(|err| SyncError::CatalogShape(format!("{url}: invalid JSON: {err}")))
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
