use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::CatalogClient;
use crate::domain::{DatasetRecord, ResourceEntry, ResourcesField};
use crate::error::SyncError;

/// Why a dataset produced no resource list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    MissingUri,
    NotAList { uri: String },
}

impl Unresolved {
    pub fn message(&self) -> String {
        match self {
            Unresolved::MissingUri => "resources is not a list and no uri to follow".to_string(),
            Unresolved::NotAList { uri } => {
                format!("resources still not a list after fetching {uri}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resources(Vec<ResourceEntry>),
    Unavailable(Unresolved),
}

pub struct ResourceResolver<'a, C: CatalogClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: CatalogClient + ?Sized> ResourceResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Authoritative resource list for `dataset`, following the dataset `uri`
    /// when the inline list was replaced by a placeholder object.
    /// Only transport failures are errors.
    pub fn resolve(&self, dataset: &DatasetRecord) -> Result<Resolution, SyncError> {
        match &dataset.resources {
            ResourcesField::Inline(items) => Ok(Resolution::Resources(to_entries(items.clone()))),
            ResourcesField::MissingUri => {
                warn!(dataset = %dataset.id, "resources is not a list and uri is missing");
                Ok(Resolution::Unavailable(Unresolved::MissingUri))
            }
            ResourcesField::Indirect(uri) => {
                debug!(dataset = %dataset.id, uri = %uri, "following dataset uri for resources");
                let document = self.client.fetch_dataset(uri)?;
                match document {
                    Value::Object(mut map) => match map.remove("resources") {
                        Some(Value::Array(items)) => Ok(Resolution::Resources(to_entries(items))),
                        _ => {
                            warn!(dataset = %dataset.id, uri = %uri, "resources still not a list");
                            Ok(Resolution::Unavailable(Unresolved::NotAList { uri: uri.clone() }))
                        }
                    },
                    _ => {
                        warn!(dataset = %dataset.id, uri = %uri, "dataset document is not an object");
                        Ok(Resolution::Unavailable(Unresolved::NotAList { uri: uri.clone() }))
                    }
                }
            }
        }
    }
}

fn to_entries(items: Vec<Value>) -> Vec<ResourceEntry> {
    items.into_iter().map(ResourceEntry::from_value).collect()
}
