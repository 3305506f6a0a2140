//! Interface upserter and primary address binding.

use crate::cache::snapshot;
use crate::error::{ReconcileError, Result};
use crate::report::{AddressBinding, ItemKind, ItemResult, Outcome, RunReport};
use ipf_netbox_core::{clean, CleanMode};
use ipfabric::DiscoveredInterface;
use netbox::{Collection, Inventory, INTERFACE_OBJECT_TYPE};
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{error, info, warn};

/// Interface type used for every created interface; discovery has no
/// equivalent field.
pub const INTERFACE_TYPE: &str = "1000base-t";

pub const EMPTY_DESCRIPTION: &str = "<empty>";

/// `false` only for an administratively disabled interface (both layers
/// down because of `admin`). Any other down state is still enabled.
pub fn is_enabled(intf: &DiscoveredInterface) -> bool {
    let down = |v: &Option<String>| v.as_deref() == Some("down");
    !(down(&intf.l1) && down(&intf.l2) && intf.reason.as_deref() == Some("admin"))
}

/// `true` when the interface carries the device's login address.
pub fn carries_login_ip(intf: &DiscoveredInterface) -> bool {
    matches!((&intf.primary_ip, &intf.login_ip), (Some(p), Some(l)) if p == l)
}

/// Device and interface ids keyed by name, built once per run.
#[derive(Debug, Clone, Default)]
pub struct InterfaceIndex {
    pub devices: HashMap<String, u64>,
    pub interfaces: HashMap<(String, String), u64>,
}

impl InterfaceIndex {
    pub fn build(inv: &dyn Inventory) -> Result<Self> {
        let devices = snapshot(inv, Collection::Devices)?
            .into_iter()
            .filter_map(|d| Some((d.name()?.to_string(), d.id)))
            .collect();
        let interfaces = snapshot(inv, Collection::Interfaces)?
            .into_iter()
            .filter_map(|i| {
                let device = i.nested_name("device")?.to_string();
                Some(((device, i.name()?.to_string()), i.id))
            })
            .collect();
        Ok(InterfaceIndex { devices, interfaces })
    }
}

/// Create every discovered interface missing from the inventory and bind
/// management addresses. Only the initial snapshot can fail the run.
pub fn sync_interfaces(inv: &dyn Inventory, interfaces: &[DiscoveredInterface]) -> Result<RunReport> {
    let mut index = InterfaceIndex::build(inv)?;
    let mut report = RunReport::start("interfaces");
    info!("adding interfaces");
    for intf in interfaces {
        report.push(sync_interface(inv, &mut index, intf));
    }
    Ok(report.finish())
}

fn sync_interface(inv: &dyn Inventory, index: &mut InterfaceIndex, intf: &DiscoveredInterface) -> ItemResult {
    let hostname = clean(intf.hostname.as_deref(), CleanMode::Identity);
    let Some(name) = intf.name_original.as_deref().or(intf.int_name.as_deref()) else {
        warn!("interface without a name on {}", hostname);
        return ItemResult::new(ItemKind::Interface, &hostname, Outcome::Skipped { reason: "no interface name".into() });
    };
    let key = format!("{}::{}", hostname, name);
    if index.interfaces.contains_key(&(hostname.clone(), name.to_string())) {
        warn!("device {} with interface {} is already in netbox", hostname, name);
        return ItemResult::new(ItemKind::Interface, key, Outcome::Skipped { reason: "already present".into() });
    }

    let device_id = match index.devices.get(&hostname) {
        Some(id) => *id,
        None => {
            let e = ReconcileError::MissingDevice(hostname.clone());
            warn!("{}, skipping interface {}", e, name);
            return ItemResult::new(ItemKind::Interface, key, Outcome::Skipped { reason: e.to_string() });
        }
    };

    let description = intf.dscr.as_deref().unwrap_or(EMPTY_DESCRIPTION);
    let attrs = json!({
        "device": device_id,
        "name": name,
        "label": description,
        "enabled": is_enabled(intf),
        "type": INTERFACE_TYPE,
        "description": description,
    });
    let created = match inv.create(Collection::Interfaces, attrs) {
        Ok(r) => r,
        Err(e) => {
            error!("unable to add interface {} for hostname {}: {}", name, hostname, e);
            return ItemResult::new(ItemKind::Interface, key, Outcome::Failed { reason: e.to_string() });
        }
    };
    info!("adding interface {} for hostname {}", name, hostname);
    index.interfaces.insert((hostname.clone(), name.to_string()), created.id);

    let mut item = ItemResult::new(ItemKind::Interface, key, Outcome::Created { id: created.id });
    if let (true, Some(ip)) = (carries_login_ip(intf), intf.login_ip.as_deref()) {
        item.binding = Some(bind_primary_address(inv, device_id, created.id, ip, &hostname));
    }
    item
}

/// Assign the first free address record matching `ip` to the interface and
/// make it the device's primary address.
pub fn bind_primary_address(
    inv: &dyn Inventory,
    device_id: u64,
    interface_id: u64,
    ip: &str,
    hostname: &str,
) -> AddressBinding {
    let failed = |reason: String| {
        error!("unable to bind {} to {}: {}", ip, hostname, reason);
        AddressBinding::Failed { reason }
    };
    let candidates = match inv.filter_by_address(ip) {
        Ok(c) => c,
        Err(e) => return failed(e.to_string()),
    };
    let wanted: Option<IpAddr> = ip.trim().parse().ok();
    let mut chosen = None;
    for candidate in candidates {
        if wanted.is_some() && candidate.address_host() != wanted {
            continue;
        }
        if candidate.is_assigned() {
            warn!("ip is already assigned: {}", candidate.label());
            continue;
        }
        chosen = Some(candidate);
        break;
    }
    let Some(address) = chosen else {
        warn!("no available match for ip address {} in netbox", ip);
        return AddressBinding::NoAvailable { address: ip.to_string() };
    };

    let assign = json!({"assigned_object_type": INTERFACE_OBJECT_TYPE, "assigned_object_id": interface_id});
    if let Err(e) = inv.update(Collection::IpAddresses, address.id, assign) {
        return failed(e.to_string());
    }
    match inv.get(Collection::Devices, device_id) {
        Ok(Some(_)) => {}
        Ok(None) => return failed(ReconcileError::MissingDevice(hostname.to_string()).to_string()),
        Err(e) => return failed(e.to_string()),
    }
    let primary = json!({"primary_ip4": address.id, "primary_ip": address.id});
    if let Err(e) = inv.update(Collection::Devices, device_id, primary) {
        return failed(e.to_string());
    }
    info!("ip {} assigned to {}", address.label(), hostname);
    AddressBinding::Bound { address_id: address.id, address: address.label().to_string() }
}
