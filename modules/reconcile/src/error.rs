use netbox::{Collection, InventoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A collection could not be loaded; nothing can proceed without it.
    #[error("unable to load {collection} from netbox: {source}")]
    Lookup {
        collection: Collection,
        #[source]
        source: InventoryError,
    },
    /// A prerequisite object could not be created.
    #[error("unable to create {collection} {name}: {source}")]
    Dependency {
        collection: Collection,
        name: String,
        #[source]
        source: InventoryError,
    },
    #[error("device {0} not found in netbox")]
    MissingDevice(String),
    #[error("{0} is not a name-and-slug collection")]
    Unsupported(Collection),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
