use std::fmt;
use std::str::FromStr;

/// The inventory collections this tool reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Sites,
    Manufacturers,
    Platforms,
    DeviceRoles,
    DeviceTypes,
    Devices,
    Interfaces,
    IpAddresses,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Sites,
        Collection::Manufacturers,
        Collection::Platforms,
        Collection::DeviceRoles,
        Collection::DeviceTypes,
        Collection::Devices,
        Collection::Interfaces,
        Collection::IpAddresses,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Sites => "sites",
            Collection::Manufacturers => "manufacturers",
            Collection::Platforms => "platforms",
            Collection::DeviceRoles => "device-roles",
            Collection::DeviceTypes => "device-types",
            Collection::Devices => "devices",
            Collection::Interfaces => "interfaces",
            Collection::IpAddresses => "ip-addresses",
        }
    }

    /// Path below the `/api/` root, with trailing slash.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Sites => "dcim/sites/",
            Collection::Manufacturers => "dcim/manufacturers/",
            Collection::Platforms => "dcim/platforms/",
            Collection::DeviceRoles => "dcim/device-roles/",
            Collection::DeviceTypes => "dcim/device-types/",
            Collection::Devices => "dcim/devices/",
            Collection::Interfaces => "dcim/interfaces/",
            Collection::IpAddresses => "ipam/ip-addresses/",
        }
    }

    /// Name-and-slug collections.
    pub fn is_org_object(self) -> bool {
        matches!(
            self,
            Collection::Sites | Collection::Manufacturers | Collection::Platforms | Collection::DeviceRoles
        )
    }

    /// Field holding the human-readable identity of a record.
    pub fn label_field(self) -> &'static str {
        match self {
            Collection::DeviceTypes => "model",
            Collection::IpAddresses => "address",
            _ => "name",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Collection::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown collection: {}", s))
    }
}
