//! Read-only inventory records as the tool server hands them to the model.
//!
//! Values are copied verbatim from the source of truth; nothing here is
//! normalized beyond flattening nested references to their display names.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub slug: String,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryDevice {
    pub name: String,
    pub device_type: String,
    pub role: String,
    pub site: String,
    pub status: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: String,
    pub description: String,
    pub status: String,
    pub dns_name: String,
    pub assigned_device: Option<String>,
}

/// A prefix enriched with the number of addresses allocated inside it.
///
/// `ip_count` is zero when the count lookup failed; the lookup never fails the
/// surrounding request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSegment {
    pub prefix: String,
    pub description: String,
    pub status: String,
    pub site: String,
    pub ip_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub vid: u16,
    pub name: String,
    pub status: String,
    pub site: String,
}

impl InventoryDevice {
    pub fn new(
        name: impl Into<String>,
        device_type: impl Into<String>,
        role: impl Into<String>,
        site: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device_type: device_type.into(),
            role: role.into(),
            site: site.into(),
            status: status.into(),
        }
    }
}

impl NetworkSegment {
    pub fn new(prefix: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            description: description.into(),
            status: "active".to_string(),
            site: String::new(),
            ip_count: 0,
        }
    }

    pub fn with_ip_count(mut self, ip_count: u64) -> Self {
        self.ip_count = ip_count;
        self
    }
}
