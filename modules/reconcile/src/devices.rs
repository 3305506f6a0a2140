//! Device upserter: one inventory device per discovered device, foreign
//! keys resolved first.

use crate::cache::{snapshot, LookupCache};
use crate::error::Result;
use crate::report::{ItemKind, ItemResult, Outcome, RunReport};
use crate::resolve::{resolve, Lookup};
use ipf_netbox_core::{clean, CleanMode};
use ipfabric::DiscoveredDevice;
use netbox::{Collection, Inventory, Record};
use serde::Serialize;
use tracing::{error, info, warn};

/// Longest serial the inventory accepts.
pub const SERIAL_MAX: usize = 50;

/// Keep the last [`SERIAL_MAX`] characters of a serial.
pub fn truncate_serial(serial: &str) -> String {
    let len = serial.chars().count();
    serial.chars().skip(len.saturating_sub(SERIAL_MAX)).collect()
}

/// Discovered values after cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanDevice {
    pub hostname: String,
    pub site: String,
    pub vendor: String,
    pub platform: String,
    pub model: String,
    pub role: String,
    pub primary_ip: String,
    pub serial: String,
}

impl From<&DiscoveredDevice> for CleanDevice {
    fn from(d: &DiscoveredDevice) -> Self {
        CleanDevice {
            hostname: clean(d.hostname.as_deref(), CleanMode::Identity),
            site: clean(d.site_name.as_deref(), CleanMode::Lowercase),
            vendor: clean(d.vendor.as_deref(), CleanMode::Lowercase),
            platform: clean(d.platform.as_deref(), CleanMode::Lowercase),
            model: clean(d.model.as_deref(), CleanMode::PlaceholderIfEmpty),
            role: clean(d.dev_type.as_deref(), CleanMode::Identity),
            primary_ip: d.login_ip.clone().unwrap_or_default(),
            serial: truncate_serial(d.sn_hw.as_deref().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Serialize)]
struct NewDevice<'a> {
    name: &'a str,
    site: u64,
    platform: u64,
    primary_ip: &'a str,
    serial: &'a str,
    device_type: u64,
    device_role: u64,
}

/// Result of a device run: the report plus the device collection as it
/// stands afterwards. `devices` is `None` when that final listing failed.
#[derive(Debug, Clone)]
pub struct DeviceSync {
    pub report: RunReport,
    pub devices: Option<Vec<Record>>,
}

/// Create every discovered device that is not yet in the inventory.
///
/// Fails only when the initial snapshot cannot be loaded. Per-device
/// failures are recorded in the report and the run moves on; objects created
/// for a failed device stay and are reused. The report is kept even when the
/// closing device listing fails.
pub fn sync_devices(inv: &dyn Inventory, devices: &[DiscoveredDevice]) -> Result<DeviceSync> {
    info!("reading parameters from netbox");
    let mut cache = LookupCache::build(inv)?;
    let mut report = RunReport::start("devices");
    for dev in devices {
        let item = sync_device(inv, &mut cache, &CleanDevice::from(dev));
        report.push(item);
    }
    let devices = match snapshot(inv, Collection::Devices) {
        Ok(devices) => Some(devices),
        Err(e) => {
            error!("unable to list devices after the run: {}", e);
            None
        }
    };
    Ok(DeviceSync { report: report.finish(), devices })
}

fn sync_device(inv: &dyn Inventory, cache: &mut LookupCache, dev: &CleanDevice) -> ItemResult {
    if cache.devices.contains(&dev.hostname) {
        warn!("device {} is already in netbox", dev.hostname);
        return ItemResult::new(
            ItemKind::Device,
            &dev.hostname,
            Outcome::Skipped { reason: "already present".into() },
        );
    }
    match create_device(inv, cache, dev) {
        Ok(id) => {
            info!("device {} was added to netbox with id {}", dev.hostname, id);
            cache.devices.insert(dev.hostname.clone());
            ItemResult::new(ItemKind::Device, &dev.hostname, Outcome::Created { id })
        }
        Err(e) => {
            error!("unable to add hostname {}: {}", dev.hostname, e);
            ItemResult::new(ItemKind::Device, &dev.hostname, Outcome::Failed { reason: e.to_string() })
        }
    }
}

fn create_device(inv: &dyn Inventory, cache: &mut LookupCache, dev: &CleanDevice) -> Result<u64> {
    let site = resolve(inv, cache, Lookup::Named { collection: Collection::Sites, name: &dev.site })?;
    let platform = resolve(inv, cache, Lookup::Named { collection: Collection::Platforms, name: &dev.platform })?;
    let device_type = resolve(inv, cache, Lookup::DeviceType { vendor: &dev.vendor, model: &dev.model })?;
    let device_role = resolve(inv, cache, Lookup::Named { collection: Collection::DeviceRoles, name: &dev.role })?;
    let attrs = serde_json::to_value(NewDevice {
        name: &dev.hostname,
        site,
        platform,
        primary_ip: &dev.primary_ip,
        serial: &dev.serial,
        device_type,
        device_role,
    })
    .map_err(|e| netbox::InventoryError::Create { collection: Collection::Devices, reason: e.to_string() })?;
    Ok(inv.create(Collection::Devices, attrs)?.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netbox::{InventoryError, MemoryInventory, Query};
    use serde_json::{json, Value};
    use std::cell::Cell;

    fn sw1() -> DiscoveredDevice {
        DiscoveredDevice {
            hostname: Some("SW1".into()),
            site_name: Some("HQ".into()),
            vendor: Some("Cisco".into()),
            platform: Some("IOS-XE".into()),
            model: Some("".into()),
            dev_type: Some("switch".into()),
            login_ip: Some("10.0.0.1".into()),
            sn_hw: Some("ABC123".into()),
        }
    }

    fn id_of(inv: &MemoryInventory, c: Collection, name: &str) -> u64 {
        inv.get_by_name(c, name).unwrap().unwrap().id
    }

    #[test]
    fn serial_keeps_last_fifty_chars() {
        let long: String = (0..60).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let cut = truncate_serial(&long);
        assert_eq!(cut.len(), 50);
        assert_eq!(cut, &long[10..]);
        assert_eq!(truncate_serial("ABCDEFGHIJ"), "ABCDEFGHIJ");
        assert_eq!(truncate_serial(""), "");
    }

    #[test]
    fn clean_device_applies_modes() {
        let c = CleanDevice::from(&DiscoveredDevice {
            hostname: Some("sw 1.lab!".into()),
            ..Default::default()
        });
        assert_eq!(c.hostname, "sw1lab");
        assert_eq!(c.site, "unspecified");
        assert_eq!(c.model, "unspecified");
        assert_eq!(c.primary_ip, "");
        assert_eq!(c.serial, "");
    }

    #[test]
    fn end_to_end_creates_dependencies_then_device() {
        let inv = MemoryInventory::new();
        let sync = sync_devices(&inv, &[sw1()]).unwrap();
        assert_eq!(sync.report.summary().created, 1);
        let devices = sync.devices.unwrap();
        assert_eq!(devices.len(), 1);

        let dev = &devices[0];
        assert_eq!(dev.name(), Some("SW1"));
        assert_eq!(dev.str_field("primary_ip"), Some("10.0.0.1"));
        assert_eq!(dev.str_field("serial"), Some("ABC123"));
        assert_eq!(dev.nested_id("site"), Some(id_of(&inv, Collection::Sites, "hq")));
        assert_eq!(dev.nested_id("platform"), Some(id_of(&inv, Collection::Platforms, "ios-xe")));
        assert_eq!(dev.nested_id("device_role"), Some(id_of(&inv, Collection::DeviceRoles, "switch")));

        let dtype = inv.get_device_type("unspecified", "cisco").unwrap().unwrap();
        assert_eq!(dev.nested_id("device_type"), Some(dtype.id));
        assert_eq!(dtype.nested_id("manufacturer"), Some(id_of(&inv, Collection::Manufacturers, "cisco")));
    }

    #[test]
    fn second_run_creates_nothing() {
        let inv = MemoryInventory::new();
        let input = vec![sw1(), DiscoveredDevice { hostname: Some("SW2".into()), ..sw1() }];
        let first = sync_devices(&inv, &input).unwrap();
        let second = sync_devices(&inv, &input).unwrap();
        assert_eq!(first.devices.map(|d| d.len()), Some(2));
        assert_eq!(second.devices.map(|d| d.len()), Some(2));
        assert_eq!(second.report.summary().skipped, 2);
        assert_eq!(inv.count(Collection::Sites), 1);
        assert_eq!(inv.count(Collection::DeviceTypes), 1);
    }

    #[test]
    fn duplicate_hostname_in_one_batch_is_skipped() {
        let inv = MemoryInventory::new();
        let sync = sync_devices(&inv, &[sw1(), sw1()]).unwrap();
        let s = sync.report.summary();
        assert_eq!((s.created, s.skipped, s.failed), (1, 1, 0));
    }

    #[test]
    fn existing_objects_are_reused() {
        let inv = MemoryInventory::new();
        let site = inv.create(Collection::Sites, json!({"name": "hq", "slug": "hq"})).unwrap();
        let sync = sync_devices(&inv, &[sw1()]).unwrap();
        assert_eq!(inv.count(Collection::Sites), 1);
        assert_eq!(sync.devices.unwrap()[0].nested_id("site"), Some(site.id));
    }

    /// Refuses to create platforms; everything else goes to memory.
    struct NoPlatforms(MemoryInventory);

    impl Inventory for NoPlatforms {
        fn all(&self, c: Collection) -> netbox::Result<Vec<Record>> { self.0.all(c) }
        fn get(&self, c: Collection, id: u64) -> netbox::Result<Option<Record>> { self.0.get(c, id) }
        fn filter(&self, c: Collection, q: &Query) -> netbox::Result<Vec<Record>> { self.0.filter(c, q) }
        fn create(&self, c: Collection, attrs: Value) -> netbox::Result<Record> {
            if c == Collection::Platforms {
                return Err(InventoryError::Create { collection: c, reason: "denied".into() });
            }
            self.0.create(c, attrs)
        }
        fn update(&self, c: Collection, id: u64, attrs: Value) -> netbox::Result<Record> { self.0.update(c, id, attrs) }
        fn delete(&self, c: Collection, id: u64) -> netbox::Result<()> { self.0.delete(c, id) }
    }

    #[test]
    fn failed_dependency_fails_only_that_device() {
        let inv = NoPlatforms(MemoryInventory::new());
        inv.0.create(Collection::Platforms, json!({"name": "junos", "slug": "junos"})).unwrap();
        let other = DiscoveredDevice {
            hostname: Some("R1".into()),
            platform: Some("JunOS".into()),
            vendor: Some("Juniper".into()),
            ..sw1()
        };
        let sync = sync_devices(&inv, &[sw1(), other]).unwrap();
        let s = sync.report.summary();
        assert_eq!((s.created, s.failed), (1, 1));
        assert_eq!(sync.report.items[0].outcome.status(), "failed");
        assert_eq!(sync.devices.unwrap()[0].name(), Some("R1"));
        // the site created before the failure is kept and reused
        assert_eq!(inv.0.count(Collection::Sites), 1);
    }

    /// Lists devices once, then the device listing breaks.
    struct FlakyDeviceList {
        inner: MemoryInventory,
        device_lists: Cell<usize>,
    }

    impl Inventory for FlakyDeviceList {
        fn all(&self, c: Collection) -> netbox::Result<Vec<Record>> {
            if c == Collection::Devices {
                let n = self.device_lists.get() + 1;
                self.device_lists.set(n);
                if n > 1 {
                    return Err(InventoryError::Config("connection reset".into()));
                }
            }
            self.inner.all(c)
        }
        fn get(&self, c: Collection, id: u64) -> netbox::Result<Option<Record>> { self.inner.get(c, id) }
        fn filter(&self, c: Collection, q: &Query) -> netbox::Result<Vec<Record>> { self.inner.filter(c, q) }
        fn create(&self, c: Collection, attrs: Value) -> netbox::Result<Record> { self.inner.create(c, attrs) }
        fn update(&self, c: Collection, id: u64, attrs: Value) -> netbox::Result<Record> { self.inner.update(c, id, attrs) }
        fn delete(&self, c: Collection, id: u64) -> netbox::Result<()> { self.inner.delete(c, id) }
    }

    #[test]
    fn report_survives_failed_closing_listing() {
        let inv = FlakyDeviceList { inner: MemoryInventory::new(), device_lists: Cell::new(0) };
        let sync = sync_devices(&inv, &[sw1()]).unwrap();
        assert!(sync.devices.is_none());
        assert_eq!(sync.report.summary().created, 1);
        assert_eq!(sync.report.items[0].key, "SW1");
        assert_eq!(inv.inner.count(Collection::Devices), 1);
    }

    #[test]
    fn dry_run_copy_leaves_source_untouched() {
        let source = MemoryInventory::new();
        source.create(Collection::Sites, json!({"name": "hq", "slug": "hq"})).unwrap();
        let copy = MemoryInventory::snapshot_of(&source, &Collection::ALL).unwrap();

        let sync = sync_devices(&copy, &[sw1()]).unwrap();
        assert_eq!(sync.report.summary().created, 1);
        assert_eq!(copy.count(Collection::Devices), 1);
        assert_eq!(copy.count(Collection::Sites), 1);

        assert_eq!(source.count(Collection::Devices), 0);
        assert_eq!(source.count(Collection::Platforms), 0);
        assert_eq!(source.count(Collection::Sites), 1);
    }
}
