use crate::record::host_of;
use crate::{Collection, Inventory, InventoryError, Query, Record, Result};
use serde_json::{json, Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;

/// Foreign keys the API expands into nested objects.
fn foreign_keys(collection: Collection) -> &'static [(&'static str, Collection)] {
    match collection {
        Collection::DeviceTypes => &[("manufacturer", Collection::Manufacturers)],
        Collection::Devices => &[
            ("site", Collection::Sites),
            ("platform", Collection::Platforms),
            ("device_type", Collection::DeviceTypes),
            ("device_role", Collection::DeviceRoles),
            ("primary_ip", Collection::IpAddresses),
            ("primary_ip4", Collection::IpAddresses),
        ],
        Collection::Interfaces => &[("device", Collection::Devices)],
        _ => &[],
    }
}

fn required_fields(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::DeviceTypes => &["model", "slug", "manufacturer"],
        Collection::Devices => &["name", "site", "device_type", "device_role"],
        Collection::Interfaces => &["device", "name", "type"],
        Collection::IpAddresses => &["address"],
        _ => &["name", "slug"],
    }
}

#[derive(Debug, Default)]
struct State {
    last_id: u64,
    tables: BTreeMap<Collection, Vec<Record>>,
}

/// Inventory held in process memory. Enforces the same natural-key
/// uniqueness and foreign-key checks as the REST API, so it backs dry runs
/// and tests.
#[derive(Debug, Default)]
pub struct MemoryInventory {
    state: RefCell<State>,
}

impl MemoryInventory {
    pub fn new() -> Self { Self::default() }

    /// Copy the listed collections of another inventory.
    pub fn snapshot_of(source: &dyn Inventory, collections: &[Collection]) -> Result<Self> {
        let mem = MemoryInventory::new();
        for &c in collections {
            for r in source.all(c)? {
                mem.insert(c, r);
            }
        }
        Ok(mem)
    }

    /// Store a record verbatim, without constraint checks.
    pub fn insert(&self, collection: Collection, record: Record) {
        let mut st = self.state.borrow_mut();
        st.last_id = st.last_id.max(record.id);
        st.tables.entry(collection).or_default().push(record);
    }

    pub fn records(&self, collection: Collection) -> Vec<Record> {
        self.state.borrow().tables.get(&collection).cloned().unwrap_or_default()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.state.borrow().tables.get(&collection).map_or(0, Vec::len)
    }

    fn find_by_id(&self, collection: Collection, id: u64) -> Option<Record> {
        self.state.borrow().tables.get(&collection)?.iter().find(|r| r.id == id).cloned()
    }

    /// Replace integer foreign keys with nested `{id, name, display}` objects.
    fn expand(&self, collection: Collection, fields: &mut Map<String, Value>) -> std::result::Result<(), String> {
        for &(key, target) in foreign_keys(collection) {
            let Some(id) = fields.get(key).and_then(Value::as_u64) else { continue };
            let related = self
                .find_by_id(target, id)
                .ok_or_else(|| format!("{}: related {} object {} does not exist", key, target, id))?;
            let mut nested = json!({"id": related.id, "display": related.label()});
            for k in ["name", "slug", "model", "address"] {
                if let Some(v) = related.fields.get(k) {
                    nested[k] = v.clone();
                }
            }
            fields.insert(key.to_string(), nested);
        }
        Ok(())
    }

    fn conflicts(&self, collection: Collection, candidate: &Record) -> Option<String> {
        let st = self.state.borrow();
        let existing = st.tables.get(&collection)?;
        let same = |a: &Record, keys: &[&str]| {
            keys.iter().all(|k| match *k {
                "manufacturer" | "device" => a.nested_id(k) == candidate.nested_id(k),
                _ => a.str_field(k) == candidate.str_field(k),
            })
        };
        let keys: &[&str] = match collection {
            Collection::DeviceTypes => &["manufacturer", "model"],
            Collection::Interfaces => &["device", "name"],
            Collection::Devices => &["name"],
            Collection::IpAddresses => return None,
            _ => &["name"],
        };
        existing
            .iter()
            .any(|a| same(a, keys))
            .then(|| format!("{} with this {} already exists", collection, keys.join(" and ")))
    }
}

fn matches(record: &Record, key: &str, wanted: &str) -> bool {
    if key == "address" {
        return match (record.address_host(), host_of(wanted)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };
    }
    match record.fields.get(key) {
        Some(Value::String(s)) => s == wanted,
        Some(Value::Number(n)) => n.to_string() == wanted,
        Some(Value::Object(o)) => ["slug", "name"]
            .iter()
            .any(|k| o.get(*k).and_then(Value::as_str) == Some(wanted))
            || o.get("id").map(|v| v.to_string()) == Some(wanted.to_string()),
        _ => false,
    }
}

impl Inventory for MemoryInventory {
    fn all(&self, collection: Collection) -> Result<Vec<Record>> {
        Ok(self.records(collection))
    }

    fn get(&self, collection: Collection, id: u64) -> Result<Option<Record>> {
        Ok(self.find_by_id(collection, id))
    }

    fn filter(&self, collection: Collection, query: &Query) -> Result<Vec<Record>> {
        Ok(self
            .records(collection)
            .into_iter()
            .filter(|r| query.pairs().iter().all(|(k, v)| matches(r, k, v)))
            .collect())
    }

    fn create(&self, collection: Collection, attrs: Value) -> Result<Record> {
        let Value::Object(mut fields) = attrs else {
            return Err(InventoryError::Create { collection, reason: "attributes must be an object".into() });
        };
        for f in required_fields(collection) {
            if matches!(fields.get(*f), None | Some(Value::Null)) {
                return Err(InventoryError::Create { collection, reason: format!("{}: this field is required", f) });
            }
        }
        self.expand(collection, &mut fields)
            .map_err(|reason| InventoryError::Create { collection, reason })?;
        let mut record = Record { id: 0, display: String::new(), fields };
        if let Some(reason) = self.conflicts(collection, &record) {
            return Err(InventoryError::Create { collection, reason });
        }
        let mut st = self.state.borrow_mut();
        st.last_id += 1;
        record.id = st.last_id;
        record.display = record.label().to_string();
        st.tables.entry(collection).or_default().push(record.clone());
        Ok(record)
    }

    fn update(&self, collection: Collection, id: u64, attrs: Value) -> Result<Record> {
        let Value::Object(mut changes) = attrs else {
            return Err(InventoryError::Create { collection, reason: "attributes must be an object".into() });
        };
        self.expand(collection, &mut changes)
            .map_err(|reason| InventoryError::Create { collection, reason })?;
        let mut st = self.state.borrow_mut();
        let record = st
            .tables
            .get_mut(&collection)
            .and_then(|t| t.iter_mut().find(|r| r.id == id))
            .ok_or(InventoryError::NotFound { collection, id })?;
        record.fields.extend(changes);
        Ok(record.clone())
    }

    fn delete(&self, collection: Collection, id: u64) -> Result<()> {
        let mut st = self.state.borrow_mut();
        let table = st.tables.entry(collection).or_default();
        let before = table.len();
        table.retain(|r| r.id != id);
        if table.len() == before {
            return Err(InventoryError::NotFound { collection, id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(inv: &MemoryInventory, c: Collection, name: &str) -> Record {
        inv.create(c, json!({"name": name, "slug": name})).unwrap()
    }

    #[test]
    fn create_assigns_ids_and_display() {
        let inv = MemoryInventory::new();
        let a = org(&inv, Collection::Sites, "hq");
        let b = org(&inv, Collection::Sites, "lab");
        assert_ne!(a.id, b.id);
        assert_eq!(a.display, "hq");
        assert_eq!(inv.count(Collection::Sites), 2);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let inv = MemoryInventory::new();
        org(&inv, Collection::Platforms, "ios-xe");
        let err = inv.create(Collection::Platforms, json!({"name": "ios-xe", "slug": "ios-xe"})).unwrap_err();
        assert!(matches!(err, InventoryError::Create { .. }));
    }

    #[test]
    fn device_type_unique_per_manufacturer() {
        let inv = MemoryInventory::new();
        let cisco = org(&inv, Collection::Manufacturers, "cisco");
        let juniper = org(&inv, Collection::Manufacturers, "juniper");
        let t = |m: u64| json!({"model": "X1", "slug": "X1", "manufacturer": m});
        inv.create(Collection::DeviceTypes, t(cisco.id)).unwrap();
        inv.create(Collection::DeviceTypes, t(juniper.id)).unwrap();
        assert!(inv.create(Collection::DeviceTypes, t(cisco.id)).is_err());
        let found = inv.get_device_type("X1", "juniper").unwrap().unwrap();
        assert_eq!(found.nested_id("manufacturer"), Some(juniper.id));
    }

    #[test]
    fn missing_foreign_key_fails_create() {
        let inv = MemoryInventory::new();
        let err = inv
            .create(Collection::DeviceTypes, json!({"model": "X1", "slug": "X1", "manufacturer": 99}))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
        let err = inv.create(Collection::DeviceTypes, json!({"model": "X1", "slug": "X1"})).unwrap_err();
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn address_filter_compares_host_part() {
        let inv = MemoryInventory::new();
        inv.create(Collection::IpAddresses, json!({"address": "10.0.0.1/24"})).unwrap();
        inv.create(Collection::IpAddresses, json!({"address": "10.0.0.10/24"})).unwrap();
        let hits = inv.filter_by_address("10.0.0.1").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].str_field("address"), Some("10.0.0.1/24"));
    }

    #[test]
    fn find_reports_ambiguity() {
        let inv = MemoryInventory::new();
        inv.insert(Collection::Sites, serde_json::from_value(json!({"id": 1, "name": "hq"})).unwrap());
        inv.insert(Collection::Sites, serde_json::from_value(json!({"id": 2, "name": "hq"})).unwrap());
        let err = inv.get_by_name(Collection::Sites, "hq").unwrap_err();
        assert!(matches!(err, InventoryError::MultipleResults { .. }));
    }

    #[test]
    fn update_and_delete() {
        let inv = MemoryInventory::new();
        let ip = inv.create(Collection::IpAddresses, json!({"address": "10.0.0.1/32"})).unwrap();
        let updated = inv
            .update(Collection::IpAddresses, ip.id, json!({"assigned_object_type": "dcim.interface", "assigned_object_id": 5}))
            .unwrap();
        assert!(updated.is_assigned());
        inv.delete(Collection::IpAddresses, ip.id).unwrap();
        assert!(matches!(
            inv.delete(Collection::IpAddresses, ip.id),
            Err(InventoryError::NotFound { .. })
        ));
    }

    #[test]
    fn inserted_ids_are_not_reused() {
        let inv = MemoryInventory::new();
        inv.insert(Collection::Sites, serde_json::from_value(json!({"id": 40, "name": "hq"})).unwrap());
        let r = org(&inv, Collection::Sites, "lab");
        assert_eq!(r.id, 41);
    }
}
