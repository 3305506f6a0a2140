//! Access to the NetBox inventory: a typed collection set, records, and two
//! backends behind the [`Inventory`] trait (REST and in-memory).

mod client;
mod collection;
mod error;
mod memory;
mod record;

pub use client::{NetboxClient, NetboxConfig};
pub use collection::Collection;
pub use error::{InventoryError, Result};
pub use memory::MemoryInventory;
pub use record::Record;

use serde_json::Value;

/// Object type NetBox uses for interface address assignments.
pub const INTERFACE_OBJECT_TYPE: &str = "dcim.interface";

/// Query parameters for `filter`/`find`, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(Vec<(&'static str, String)>);

impl Query {
    pub fn new() -> Self { Query(Vec::new()) }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.push((key, value.into()));
        self
    }

    pub fn pairs(&self) -> &[(&'static str, String)] { &self.0 }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// CRUD contract of the inventory, one method set for every [`Collection`].
pub trait Inventory {
    /// Every record of the collection.
    fn all(&self, collection: Collection) -> Result<Vec<Record>>;

    fn get(&self, collection: Collection, id: u64) -> Result<Option<Record>>;

    /// Records matching every pair of the query.
    fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>>;

    /// Create a record. Constraint violations surface as [`InventoryError::Create`].
    fn create(&self, collection: Collection, attrs: Value) -> Result<Record>;

    /// Persist a partial change of an existing record.
    fn update(&self, collection: Collection, id: u64, attrs: Value) -> Result<Record>;

    fn delete(&self, collection: Collection, id: u64) -> Result<()>;

    /// Single-record lookup: `None` for no match, an error for more than one.
    fn find(&self, collection: Collection, query: &Query) -> Result<Option<Record>> {
        let mut found = self.filter(collection, query)?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(InventoryError::MultipleResults { collection, query: query.to_string() }),
        }
    }

    fn get_by_name(&self, collection: Collection, name: &str) -> Result<Option<Record>> {
        self.find(collection, &Query::new().with("name", name))
    }

    /// Device-type lookup by its natural key. `manufacturer` is the manufacturer slug.
    fn get_device_type(&self, model: &str, manufacturer: &str) -> Result<Option<Record>> {
        self.find(
            Collection::DeviceTypes,
            &Query::new().with("model", model).with("manufacturer", manufacturer),
        )
    }

    fn filter_by_address(&self, address: &str) -> Result<Vec<Record>> {
        self.filter(Collection::IpAddresses, &Query::new().with("address", address))
    }
}
