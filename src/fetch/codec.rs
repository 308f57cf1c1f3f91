use crate::model::Catalog;
use crate::{FedcatError, Result};

/// Turns a raw catalog response body into a catalog
pub trait CatalogDecoder: Send + Sync {
    fn decode(&self, body: &[u8]) -> Result<Catalog>;
}

/// Decodes catalogs from plain JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCatalogDecoder;

impl CatalogDecoder for JsonCatalogDecoder {
    fn decode(&self, body: &[u8]) -> Result<Catalog> {
        serde_json::from_slice(body).map_err(|e| FedcatError::Decode(e.to_string()))
    }
}
