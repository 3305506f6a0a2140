//! Lookup-or-create for org objects and device types.

use crate::cache::LookupCache;
use crate::error::{ReconcileError, Result};
use ipf_netbox_core::UNSPECIFIED;
use netbox::{Collection, Inventory, InventoryError};
use serde_json::json;
use tracing::{info, warn};

/// A natural key to resolve to an inventory id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Named { collection: Collection, name: &'a str },
    DeviceType { vendor: &'a str, model: &'a str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: u64,
    pub created: bool,
}

fn dependency(collection: Collection, name: &str) -> impl FnOnce(InventoryError) -> ReconcileError {
    let name = name.to_string();
    move |source| ReconcileError::Dependency { collection, name, source }
}

/// Return the id of the `name` record in `collection`, creating `{name, slug: name}` if absent.
pub fn upsert_simple(inv: &dyn Inventory, collection: Collection, name: &str) -> Result<Resolved> {
    if !collection.is_org_object() {
        return Err(ReconcileError::Unsupported(collection));
    }
    if let Some(existing) = inv.get_by_name(collection, name)? {
        warn!("{} {} is already in netbox", collection, name);
        return Ok(Resolved { id: existing.id, created: false });
    }
    let created = inv
        .create(collection, json!({"name": name, "slug": name}))
        .map_err(dependency(collection, name))?;
    info!("new {} added into netbox: {} with id {}", collection, name, created.id);
    Ok(Resolved { id: created.id, created: true })
}

/// Return the id of the `(model, vendor)` device type, creating the
/// manufacturer and then the type when missing.
pub fn upsert_device_type(inv: &dyn Inventory, vendor: &str, model: &str) -> Result<Resolved> {
    let model = if model.trim().is_empty() { UNSPECIFIED } else { model };
    let manufacturer = upsert_simple(inv, Collection::Manufacturers, vendor)?;
    if let Some(existing) = inv.get_device_type(model, vendor)? {
        warn!("device type {} is already in netbox", model);
        return Ok(Resolved { id: existing.id, created: false });
    }
    let attrs = json!({"model": model, "slug": model, "manufacturer": manufacturer.id});
    let created = inv
        .create(Collection::DeviceTypes, attrs)
        .map_err(dependency(Collection::DeviceTypes, model))?;
    info!("added new device type {} under manufacturer {} with id {}", model, vendor, created.id);
    Ok(Resolved { id: created.id, created: true })
}

/// Resolve a key to an id. Keys already in `cache` are read back with one
/// lookup; others go through the upsert path and are then remembered.
pub fn resolve(inv: &dyn Inventory, cache: &mut LookupCache, lookup: Lookup<'_>) -> Result<u64> {
    if cache.contains(&lookup) {
        let found = match lookup {
            Lookup::Named { collection, name } => inv.get_by_name(collection, name)?,
            Lookup::DeviceType { vendor, model } => inv.get_device_type(model, vendor)?,
        };
        if let Some(r) = found {
            return Ok(r.id);
        }
    }
    let resolved = match lookup {
        Lookup::Named { collection, name } => upsert_simple(inv, collection, name)?,
        Lookup::DeviceType { vendor, model } => upsert_device_type(inv, vendor, model)?,
    };
    cache.remember(&lookup);
    Ok(resolved.id)
}
