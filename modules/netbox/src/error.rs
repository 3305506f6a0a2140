use crate::Collection;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InventoryError>;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method} {url} returned {status}: {body}")]
    Status { method: &'static str, url: String, status: u16, body: String },
    #[error("unable to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{collection} lookup by {query} returned more than one result")]
    MultipleResults { collection: Collection, query: String },
    #[error("unable to create {collection} record: {reason}")]
    Create { collection: Collection, reason: String },
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: u64 },
    #[error("invalid netbox configuration: {0}")]
    Config(String),
}
