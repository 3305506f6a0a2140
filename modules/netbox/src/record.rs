use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::IpAddr;

/// A record as returned by the inventory API. Fields other than `id` and
/// `display` are kept as JSON; nested foreign keys stay nested objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    #[serde(default)]
    pub display: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> { self.str_field("name") }

    pub fn model(&self) -> Option<&str> { self.str_field("model") }

    /// Display string: `display`, else name, model or address.
    pub fn label(&self) -> &str {
        if !self.display.is_empty() {
            return &self.display;
        }
        ["name", "model", "address"]
            .iter()
            .find_map(|k| self.str_field(k))
            .unwrap_or("")
    }

    /// Id of a foreign key, nested (`{"id": 3, ...}`) or flat (`3`).
    pub fn nested_id(&self, key: &str) -> Option<u64> {
        match self.fields.get(key)? {
            Value::Object(o) => o.get("id").and_then(Value::as_u64),
            v => v.as_u64(),
        }
    }

    /// Name of a nested foreign key object.
    pub fn nested_name(&self, key: &str) -> Option<&str> {
        self.fields.get(key)?.as_object()?.get("name").and_then(Value::as_str)
    }

    /// Slug of a nested foreign key object, falling back to its name.
    pub fn nested_slug(&self, key: &str) -> Option<&str> {
        let obj = self.fields.get(key)?.as_object()?;
        obj.get("slug").or_else(|| obj.get("name")).and_then(Value::as_str)
    }

    /// An address record is available when nothing is assigned to it.
    pub fn is_assigned(&self) -> bool {
        !matches!(self.fields.get("assigned_object_id"), None | Some(Value::Null))
    }

    /// Host part of an address record (`10.0.0.1/24` -> `10.0.0.1`).
    pub fn address_host(&self) -> Option<IpAddr> {
        self.str_field("address").and_then(host_of)
    }
}

/// Parse a bare IP or the host part of a CIDR string.
pub(crate) fn host_of(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpNet>()
        .map(|net| net.addr())
        .or_else(|_| value.parse::<IpAddr>())
        .ok()
}
