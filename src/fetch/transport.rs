//! Catalog request transport
//!
//! The transport only moves bytes: it sends one catalog request and returns
//! the response body. Decoding is left to a [`CatalogDecoder`](super::CatalogDecoder).

use crate::config::TransportConfig;
use crate::fetch::CatalogRequest;
use crate::{FedcatError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

/// Path, relative to a node's catalog address, that catalog requests are posted to
const CATALOG_REQUEST_PATH: &str = "catalog/request";

/// Sends catalog requests to remote nodes
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the raw response body
    async fn dispatch(&self, request: &CatalogRequest) -> Result<Vec<u8>>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The transport configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &TransportConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Wire form of a catalog request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogRequestMessage<'a> {
    #[serde(rename = "@type")]
    message_type: &'static str,
    counter_party_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    counter_party_id: Option<&'a str>,
    protocol: &'a str,
    query_spec: QuerySpecMessage,
}

#[derive(Debug, Serialize)]
struct QuerySpecMessage {
    offset: usize,
    limit: usize,
}

impl<'a> From<&'a CatalogRequest> for CatalogRequestMessage<'a> {
    fn from(request: &'a CatalogRequest) -> Self {
        Self {
            message_type: "CatalogRequestMessage",
            counter_party_address: &request.counterparty_address,
            counter_party_id: request.counterparty_id.as_deref(),
            protocol: &request.protocol,
            query_spec: QuerySpecMessage {
                offset: request.range.from,
                limit: request.range.to.saturating_sub(request.range.from),
            },
        }
    }
}

/// Transport that POSTs catalog requests as JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            auth_token: config.auth_token.clone(),
        })
    }

    /// Wraps an existing client
    pub fn with_client(client: Client, auth_token: Option<String>) -> Self {
        Self { client, auth_token }
    }
}

/// Resolves the catalog request endpoint below a node's address
fn request_endpoint(address: &str) -> Result<Url> {
    let mut base = Url::parse(address)?;
    // without a trailing slash `join` would replace the last path segment
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join(CATALOG_REQUEST_PATH)?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &CatalogRequest) -> Result<Vec<u8>> {
        let endpoint = request_endpoint(&request.counterparty_address)?;
        tracing::debug!(
            "Requesting catalog range [{}, {}) from {}",
            request.range.from,
            request.range.to,
            endpoint
        );

        let mut builder = self
            .client
            .post(endpoint.clone())
            .json(&CatalogRequestMessage::from(request));
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| FedcatError::Transport {
            url: endpoint.to_string(),
            source: e,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FedcatError::Http {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| FedcatError::Transport {
            url: endpoint.to_string(),
            source: e,
        })?;
        Ok(body.to_vec())
    }
}
