use netbox::Collection;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| String::new())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Site,
    Manufacturer,
    Platform,
    DeviceRole,
    DeviceType,
    Device,
    Interface,
    IpAddress,
}

impl From<Collection> for ItemKind {
    fn from(c: Collection) -> Self {
        match c {
            Collection::Sites => ItemKind::Site,
            Collection::Manufacturers => ItemKind::Manufacturer,
            Collection::Platforms => ItemKind::Platform,
            Collection::DeviceRoles => ItemKind::DeviceRole,
            Collection::DeviceTypes => ItemKind::DeviceType,
            Collection::Devices => ItemKind::Device,
            Collection::Interfaces => ItemKind::Interface,
            Collection::IpAddresses => ItemKind::IpAddress,
        }
    }
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Site => "site",
            ItemKind::Manufacturer => "manufacturer",
            ItemKind::Platform => "platform",
            ItemKind::DeviceRole => "device_role",
            ItemKind::DeviceType => "device_type",
            ItemKind::Device => "device",
            ItemKind::Interface => "interface",
            ItemKind::IpAddress => "ip_address",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Created { id: u64 },
    Existing { id: u64 },
    Skipped { reason: String },
    Deleted { id: u64 },
    Failed { reason: String },
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Created { .. } => "created",
            Outcome::Existing { .. } => "existing",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Deleted { .. } => "deleted",
            Outcome::Failed { .. } => "failed",
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Outcome::Created { id } | Outcome::Existing { id } | Outcome::Deleted { id } => Some(*id),
            _ => None,
        }
    }

    /// Reason text for skipped and failed items.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Skipped { reason } | Outcome::Failed { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

/// What happened to the primary address of a management interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AddressBinding {
    Bound { address_id: u64, address: String },
    NoAvailable { address: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemResult {
    pub kind: ItemKind,
    pub key: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding: Option<AddressBinding>,
}

impl ItemResult {
    pub fn new(kind: ItemKind, key: impl Into<String>, outcome: Outcome) -> Self {
        ItemResult { kind, key: key.into(), outcome, binding: None }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    pub addresses_bound: usize,
    pub addresses_unbound: usize,
}

/// Per-run record of every item the run touched.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub operation: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub items: Vec<ItemResult>,
}

impl RunReport {
    pub fn start(operation: impl Into<String>) -> Self {
        RunReport {
            run_id: Uuid::now_v7(),
            operation: operation.into(),
            started_at: now_rfc3339(),
            finished_at: None,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: ItemResult) { self.items.push(item); }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(now_rfc3339());
        self
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for item in &self.items {
            match item.outcome {
                Outcome::Created { .. } => s.created += 1,
                Outcome::Existing { .. } => s.existing += 1,
                Outcome::Skipped { .. } => s.skipped += 1,
                Outcome::Deleted { .. } => s.deleted += 1,
                Outcome::Failed { .. } => s.failed += 1,
            }
            match item.binding {
                Some(AddressBinding::Bound { .. }) => s.addresses_bound += 1,
                Some(_) => s.addresses_unbound += 1,
                None => {}
            }
        }
        s
    }

    /// Ids in item order, `None` where the item has no id.
    pub fn ids(&self) -> Vec<Option<u64>> {
        self.items.iter().map(|i| i.outcome.id()).collect()
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(|i| matches!(i.outcome, Outcome::Failed { .. }))
    }
}
