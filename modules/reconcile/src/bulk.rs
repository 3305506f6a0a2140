//! Batch operations on single collections: add names, add device types,
//! delete by name, list.

use crate::cache::snapshot;
use crate::error::{ReconcileError, Result};
use crate::report::{ItemKind, ItemResult, Outcome, RunReport};
use crate::resolve::{upsert_device_type, upsert_simple, Resolved};
use netbox::{Collection, Inventory, Query};
use tracing::{error, info, warn};

fn outcome(resolved: std::result::Result<Resolved, ReconcileError>, key: &str) -> Outcome {
    match resolved {
        Ok(Resolved { id, created: true }) => Outcome::Created { id },
        Ok(Resolved { id, created: false }) => Outcome::Existing { id },
        Err(e) => {
            error!("unable to add {}: {}", key, e);
            Outcome::Failed { reason: e.to_string() }
        }
    }
}

/// Upsert each name into a name-and-slug collection. Ids are in the report,
/// in input order.
pub fn add_named(inv: &dyn Inventory, collection: Collection, names: &[String]) -> Result<RunReport> {
    if !collection.is_org_object() {
        return Err(ReconcileError::Unsupported(collection));
    }
    let mut report = RunReport::start(format!("add {}", collection));
    for name in names {
        let result = upsert_simple(inv, collection, name);
        report.push(ItemResult::new(collection.into(), name, outcome(result, name)));
    }
    Ok(report.finish())
}

/// Upsert `(vendor, model)` device types, creating manufacturers as needed.
pub fn add_device_types(inv: &dyn Inventory, types: &[(String, String)]) -> RunReport {
    let mut report = RunReport::start("add device-types");
    for (vendor, model) in types {
        let key = format!("{}/{}", vendor, model);
        let result = upsert_device_type(inv, vendor, model);
        report.push(ItemResult::new(ItemKind::DeviceType, &key, outcome(result, &key)));
    }
    report.finish()
}

/// Delete every named record of `collection`. Names that are not present are
/// reported as skipped.
pub fn delete_named(inv: &dyn Inventory, collection: Collection, names: &[String]) -> RunReport {
    let mut report = RunReport::start(format!("delete {}", collection));
    for name in names {
        let query = Query::new().with(collection.label_field(), name.as_str());
        let outcome = match inv.find(collection, &query) {
            Ok(None) => {
                warn!("the {} {} is not in netbox, nothing to delete", collection, name);
                Outcome::Skipped { reason: "not present".into() }
            }
            Ok(Some(record)) => match inv.delete(collection, record.id) {
                Ok(()) => {
                    info!("deleted {} {} from netbox", collection, name);
                    Outcome::Deleted { id: record.id }
                }
                Err(e) => {
                    error!("unable to delete {} {}: {}", collection, name, e);
                    Outcome::Failed { reason: e.to_string() }
                }
            },
            Err(e) => {
                error!("unable to look up {} {}: {}", collection, name, e);
                Outcome::Failed { reason: e.to_string() }
            }
        };
        report.push(ItemResult::new(collection.into(), name, outcome));
    }
    report.finish()
}

/// Display names of every record in `collection`.
pub fn list(inv: &dyn Inventory, collection: Collection) -> Result<Vec<String>> {
    Ok(snapshot(inv, collection)?.iter().map(|r| r.label().to_string()).collect())
}

/// Parse `vendor:model` pairs; the model may be empty.
pub fn parse_device_type(spec: &str) -> Option<(String, String)> {
    let (vendor, model) = spec.split_once(':')?;
    let vendor = vendor.trim();
    if vendor.is_empty() {
        return None;
    }
    Some((vendor.to_string(), model.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbox::MemoryInventory;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn add_named_returns_ids_in_order() {
        let inv = MemoryInventory::new();
        let first = add_named(&inv, Collection::Sites, &names(&["hq", "lab"])).unwrap();
        let second = add_named(&inv, Collection::Sites, &names(&["lab", "hq", "dc"])).unwrap();
        let a = first.ids();
        let b = second.ids();
        assert_eq!(b[0], a[1]);
        assert_eq!(b[1], a[0]);
        let s = second.summary();
        assert_eq!((s.existing, s.created), (2, 1));
        assert!(add_named(&inv, Collection::Interfaces, &names(&["x"])).is_err());
    }

    #[test]
    fn delete_processes_every_name() {
        let inv = MemoryInventory::new();
        add_named(&inv, Collection::Platforms, &names(&["ios-xe", "junos", "eos"])).unwrap();
        let report = delete_named(&inv, Collection::Platforms, &names(&["ios-xe", "missing", "eos"]));
        let statuses: Vec<_> = report.items.iter().map(|i| i.outcome.status()).collect();
        assert_eq!(statuses, vec!["deleted", "skipped", "deleted"]);
        assert_eq!(list(&inv, Collection::Platforms).unwrap(), vec!["junos".to_string()]);
    }

    #[test]
    fn delete_device_type_by_model() {
        let inv = MemoryInventory::new();
        add_device_types(&inv, &[("cisco".into(), "X1".into())]);
        let report = delete_named(&inv, Collection::DeviceTypes, &names(&["X1"]));
        assert_eq!(report.summary().deleted, 1);
        assert_eq!(inv.count(Collection::DeviceTypes), 0);
        assert_eq!(inv.count(Collection::Manufacturers), 1);
    }

    #[test]
    fn add_device_types_reports_each_pair() {
        let inv = MemoryInventory::new();
        let report = add_device_types(
            &inv,
            &[("cisco".into(), "X1".into()), ("juniper".into(), "X1".into()), ("cisco".into(), "X1".into())],
        );
        let statuses: Vec<_> = report.items.iter().map(|i| i.outcome.status()).collect();
        assert_eq!(statuses, vec!["created", "created", "existing"]);
        assert_eq!(report.items[1].key, "juniper/X1");
    }

    #[test]
    fn device_type_specs() {
        assert_eq!(parse_device_type("cisco:WS-C3750E-24TD"), Some(("cisco".into(), "WS-C3750E-24TD".into())));
        assert_eq!(parse_device_type("cisco:"), Some(("cisco".into(), "".into())));
        assert_eq!(parse_device_type("cisco"), None);
        assert_eq!(parse_device_type(":X1"), None);
    }
}
