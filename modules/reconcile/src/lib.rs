//! Reconciliation of discovered devices and interfaces into NetBox.
//!
//! Dependencies are resolved before dependents: manufacturer before device
//! type; site, platform, device type and role before device; device before
//! interface. Existence is checked against snapshots taken at the start of a
//! run and every create is an independent call, so two concurrent runs can
//! still race and create the same object twice.

mod bulk;
mod cache;
mod devices;
mod error;
mod interfaces;
mod report;
mod resolve;

pub use bulk::{add_device_types, add_named, delete_named, list, parse_device_type};
pub use cache::{snapshot, LookupCache};
pub use devices::{sync_devices, truncate_serial, CleanDevice, DeviceSync, SERIAL_MAX};
pub use error::{ReconcileError, Result};
pub use interfaces::{
    bind_primary_address, carries_login_ip, is_enabled, sync_interfaces, InterfaceIndex, EMPTY_DESCRIPTION,
    INTERFACE_TYPE,
};
pub use report::{AddressBinding, ItemKind, ItemResult, Outcome, RunReport, Summary};
pub use resolve::{resolve, upsert_device_type, upsert_simple, Lookup, Resolved};
