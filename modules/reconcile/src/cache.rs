//! One-shot snapshots of the inventory, taken before a batch so that
//! existence checks cost no round trips.

use crate::error::{ReconcileError, Result};
use crate::resolve::Lookup;
use netbox::{Collection, Inventory, Record};
use std::collections::HashSet;
use tracing::debug;

/// Every record of `collection`. A failure here is fatal to the run.
pub fn snapshot(inv: &dyn Inventory, collection: Collection) -> Result<Vec<Record>> {
    let records = inv
        .all(collection)
        .map_err(|source| ReconcileError::Lookup { collection, source })?;
    debug!("loaded {} {}", records.len(), collection);
    Ok(records)
}

fn name_key(r: &Record) -> String {
    r.name().unwrap_or_else(|| r.label()).to_string()
}

/// Natural keys of the collections the device upserter depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupCache {
    pub devices: HashSet<String>,
    pub sites: HashSet<String>,
    pub platforms: HashSet<String>,
    pub roles: HashSet<String>,
    /// `(manufacturer slug, model)`
    pub device_types: HashSet<(String, String)>,
    pub manufacturers: HashSet<String>,
}

impl LookupCache {
    pub fn build(inv: &dyn Inventory) -> Result<Self> {
        let names = |c| -> Result<HashSet<String>> { Ok(snapshot(inv, c)?.iter().map(name_key).collect()) };
        let device_types = snapshot(inv, Collection::DeviceTypes)?
            .iter()
            .filter_map(|r| {
                let manufacturer = r.nested_slug("manufacturer")?;
                Some((manufacturer.to_string(), r.model()?.to_string()))
            })
            .collect();
        Ok(LookupCache {
            devices: names(Collection::Devices)?,
            sites: names(Collection::Sites)?,
            platforms: names(Collection::Platforms)?,
            roles: names(Collection::DeviceRoles)?,
            manufacturers: names(Collection::Manufacturers)?,
            device_types,
        })
    }

    fn names(&self, collection: Collection) -> Option<&HashSet<String>> {
        match collection {
            Collection::Devices => Some(&self.devices),
            Collection::Sites => Some(&self.sites),
            Collection::Platforms => Some(&self.platforms),
            Collection::DeviceRoles => Some(&self.roles),
            Collection::Manufacturers => Some(&self.manufacturers),
            _ => None,
        }
    }

    fn names_mut(&mut self, collection: Collection) -> Option<&mut HashSet<String>> {
        match collection {
            Collection::Devices => Some(&mut self.devices),
            Collection::Sites => Some(&mut self.sites),
            Collection::Platforms => Some(&mut self.platforms),
            Collection::DeviceRoles => Some(&mut self.roles),
            Collection::Manufacturers => Some(&mut self.manufacturers),
            _ => None,
        }
    }

    pub fn contains(&self, lookup: &Lookup<'_>) -> bool {
        match *lookup {
            Lookup::Named { collection, name } => self.names(collection).map_or(false, |s| s.contains(name)),
            Lookup::DeviceType { vendor, model } => {
                self.device_types.contains(&(vendor.to_string(), model.to_string()))
            }
        }
    }

    pub fn remember(&mut self, lookup: &Lookup<'_>) {
        match *lookup {
            Lookup::Named { collection, name } => {
                if let Some(s) = self.names_mut(collection) {
                    s.insert(name.to_string());
                }
            }
            Lookup::DeviceType { vendor, model } => {
                self.manufacturers.insert(vendor.to_string());
                self.device_types.insert((vendor.to_string(), model.to_string()));
            }
        }
    }
}
