//! Crawl targets and the per-cycle work item ledger

use crate::model::Catalog;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote node listed in the target directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    /// Node identifier
    pub id: String,

    /// Base URL of the node's catalog endpoint
    pub url: String,

    /// Protocols the node speaks, in order of preference
    pub supported_protocols: Vec<String>,
}

impl Target {
    pub fn new(id: impl Into<String>, url: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            supported_protocols: protocols,
        }
    }
}

/// A crawl job for one target within one cycle
///
/// The error list only grows; the execution manager drops the item once it
/// holds more errors than the configured retry cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    target_id: String,
    target_url: String,
    protocol: String,
    errors: Vec<String>,
}

impl WorkItem {
    pub fn new(
        target_id: impl Into<String>,
        target_url: impl Into<String>,
        protocol: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            target_url: target_url.into(),
            protocol: protocol.into(),
            errors: Vec::new(),
        }
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Records a failed attempt
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Builds the request handed to a crawl action
    pub fn to_request(&self) -> UpdateRequest {
        UpdateRequest {
            node_id: self.target_id.clone(),
            node_url: self.target_url.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WorkItem{{id='{}', url='{}', protocol='{}', errors={}}}",
            self.target_id,
            self.target_url,
            self.protocol,
            self.errors.len()
        )
    }
}

/// Request passed to a crawl action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub node_id: String,
    pub node_url: String,
    pub protocol: String,
}

/// Successful outcome of a crawl action
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResponse {
    /// URL of the node the catalog was fetched from
    pub source: String,

    /// The fully assembled catalog
    pub catalog: Catalog,
}

impl UpdateResponse {
    pub fn new(source: impl Into<String>, catalog: Catalog) -> Self {
        Self {
            source: source.into(),
            catalog,
        }
    }
}
