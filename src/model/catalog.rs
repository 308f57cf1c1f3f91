//! Catalog tree types
//!
//! A catalog lists datasets, data services and distributions. A dataset
//! entry may itself be a whole catalog, which is how nodes publish
//! hierarchies; [`DatasetNode`] makes that distinction explicit.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Property under which the cache stores the origin of a catalog
pub const PROPERTY_ORIGINATOR: &str = "originator";

/// A catalog published by a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    /// Catalog identifier
    pub id: String,

    /// Identifier of the participant that publishes this catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,

    /// Free-form catalog properties
    #[serde(default)]
    pub properties: HashMap<String, Value>,

    /// Services through which the catalog's data can be reached
    #[serde(default)]
    pub data_services: Vec<DataService>,

    /// Datasets, some of which may be nested catalogs
    #[serde(default)]
    pub datasets: Vec<DatasetNode>,

    /// Distributions offered at catalog level
    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// An entry of a catalog's dataset list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum DatasetNode {
    /// A plain dataset
    Dataset(Dataset),

    /// A sub-catalog published in place of a dataset
    Catalog(Catalog),
}

/// A plain dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,

    #[serde(default)]
    pub properties: HashMap<String, Value>,

    #[serde(default)]
    pub distributions: Vec<Distribution>,
}

/// A service endpoint through which data (or a sub-catalog) is served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataService {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_description: Option<String>,
}

/// A concrete, downloadable form of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Id of the data service this distribution is served by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_service: Option<String>,
}

impl Catalog {
    /// Creates an empty catalog with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participant_id: None,
            properties: HashMap::new(),
            data_services: Vec::new(),
            datasets: Vec::new(),
            distributions: Vec::new(),
        }
    }

    pub fn with_participant_id(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_data_service(mut self, service: DataService) -> Self {
        self.data_services.push(service);
        self
    }

    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(DatasetNode::Dataset(dataset));
        self
    }

    pub fn with_sub_catalog(mut self, catalog: Catalog) -> Self {
        self.datasets.push(DatasetNode::Catalog(catalog));
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distributions.push(distribution);
        self
    }

    /// Returns the originator property, if it is set
    pub fn originator(&self) -> Option<String> {
        self.properties.get(PROPERTY_ORIGINATOR).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Returns the key under which this catalog is cached
    ///
    /// The originator wins over the catalog's own id so that a node's catalog
    /// replaces its previous version even if the catalog id changes.
    pub fn cache_key(&self) -> String {
        self.originator().unwrap_or_else(|| self.id.clone())
    }

    /// Iterates over the plain datasets of this catalog (not recursive)
    pub fn plain_datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datasets.iter().filter_map(|node| match node {
            DatasetNode::Dataset(dataset) => Some(dataset),
            DatasetNode::Catalog(_) => None,
        })
    }

    /// Iterates over the sub-catalogs of this catalog (not recursive)
    pub fn sub_catalogs(&self) -> impl Iterator<Item = &Catalog> {
        self.datasets.iter().filter_map(|node| match node {
            DatasetNode::Catalog(catalog) => Some(catalog),
            DatasetNode::Dataset(_) => None,
        })
    }

    /// Returns the first data service endpoint that can be crawled
    pub fn first_endpoint(&self) -> Option<&str> {
        self.data_services
            .iter()
            .find_map(|service| service.endpoint_url.as_deref())
    }
}

impl DatasetNode {
    pub fn id(&self) -> &str {
        match self {
            Self::Dataset(dataset) => &dataset.id,
            Self::Catalog(catalog) => &catalog.id,
        }
    }

    pub fn is_catalog(&self) -> bool {
        matches!(self, Self::Catalog(_))
    }
}

impl Dataset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: HashMap::new(),
            distributions: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl DataService {
    pub fn new(id: impl Into<String>, endpoint_url: Option<String>) -> Self {
        Self {
            id: id.into(),
            endpoint_url,
            endpoint_description: None,
        }
    }
}

impl Distribution {
    pub fn new(format: impl Into<String>, data_service: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            data_service: Some(data_service.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_prefers_originator() {
        let catalog = Catalog::new("cat-1").with_property(PROPERTY_ORIGINATOR, "https://node-a");
        assert_eq!(catalog.cache_key(), "https://node-a");

        let catalog = Catalog::new("cat-1");
        assert_eq!(catalog.cache_key(), "cat-1");
    }

    #[test]
    fn test_non_string_originator_is_stringified() {
        let catalog = Catalog::new("cat-1").with_property(PROPERTY_ORIGINATOR, 42);
        assert_eq!(catalog.cache_key(), "42");
    }

    #[test]
    fn test_partition_by_type() {
        let catalog = Catalog::new("root")
            .with_dataset(Dataset::new("d1"))
            .with_sub_catalog(Catalog::new("sub"))
            .with_dataset(Dataset::new("d2"));

        let plain: Vec<_> = catalog.plain_datasets().map(|d| d.id.as_str()).collect();
        let nested: Vec<_> = catalog.sub_catalogs().map(|c| c.id.as_str()).collect();

        assert_eq!(plain, vec!["d1", "d2"]);
        assert_eq!(nested, vec!["sub"]);
    }

    #[test]
    fn test_first_endpoint_skips_services_without_url() {
        let catalog = Catalog::new("sub")
            .with_data_service(DataService::new("svc-1", None))
            .with_data_service(DataService::new("svc-2", Some("https://b".to_string())))
            .with_data_service(DataService::new("svc-3", Some("https://c".to_string())));

        assert_eq!(catalog.first_endpoint(), Some("https://b"));
        assert_eq!(Catalog::new("empty").first_endpoint(), None);
    }

    #[test]
    fn test_deserialize_nested_catalog() {
        let raw = json!({
            "id": "root",
            "participantId": "provider",
            "dataServices": [{"id": "svc", "endpointUrl": "https://root"}],
            "datasets": [
                {"@type": "Dataset", "id": "d1"},
                {"@type": "Catalog", "id": "sub", "datasets": [{"@type": "Dataset", "id": "d2"}]}
            ]
        });

        let catalog: Catalog = serde_json::from_value(raw).unwrap();

        assert_eq!(catalog.participant_id.as_deref(), Some("provider"));
        assert_eq!(catalog.datasets.len(), 2);
        assert!(!catalog.datasets[0].is_catalog());
        assert!(catalog.datasets[1].is_catalog());
        assert_eq!(catalog.sub_catalogs().next().unwrap().datasets[0].id(), "d2");
        assert!(catalog.distributions.is_empty());
    }
}
