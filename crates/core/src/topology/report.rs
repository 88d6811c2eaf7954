use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::inventory::{InventoryDevice, NetworkSegment, Vlan};

use super::{render, Layer, TopologySnapshot};

/// Payload of the `generate_topology` tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyReport {
    pub summary: TopologySummary,
    pub devices_by_role: BTreeMap<String, Vec<InventoryDevice>>,
    pub network_segments: Vec<NetworkSegment>,
    pub vlans: Vec<Vlan>,
    pub topology_layers: TopologyLayers,
    pub diagram: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub total_devices: usize,
    pub total_prefixes: usize,
    pub total_vlans: usize,
    /// Distinct roles in the order they first appear.
    pub device_roles: Vec<String>,
    /// Devices no layer rule matched; they are not drawn.
    pub unclassified_devices: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyLayers {
    pub perimeter: Vec<String>,
    pub core: Vec<String>,
    pub distribution: Vec<String>,
    pub access: Vec<String>,
    pub security: Vec<String>,
}

const UNASSIGNED_ROLE: &str = "unassigned";

impl TopologyReport {
    pub fn from_snapshot(snapshot: &TopologySnapshot) -> Self {
        let layers = snapshot.layers();

        let mut device_roles: Vec<String> = Vec::new();
        let mut devices_by_role: BTreeMap<String, Vec<InventoryDevice>> = BTreeMap::new();
        for device in layers.devices() {
            let role = if device.role.trim().is_empty() {
                UNASSIGNED_ROLE.to_string()
            } else {
                device.role.clone()
            };
            if !device_roles.contains(&role) {
                device_roles.push(role.clone());
            }
            devices_by_role.entry(role).or_default().push(device.clone());
        }

        let names = |layer: Layer| -> Vec<String> {
            layers.bucket(layer).into_iter().map(|device| device.name.clone()).collect()
        };

        Self {
            summary: TopologySummary {
                total_devices: layers.len(),
                total_prefixes: snapshot.segments().len(),
                total_vlans: snapshot.vlans().len(),
                device_roles,
                unclassified_devices: names(Layer::Unclassified),
            },
            devices_by_role,
            network_segments: snapshot.segments().to_vec(),
            vlans: snapshot.vlans().to_vec(),
            topology_layers: TopologyLayers {
                perimeter: names(Layer::Perimeter),
                core: names(Layer::Core),
                distribution: names(Layer::Distribution),
                access: names(Layer::Access),
                security: names(Layer::Security),
            },
            diagram: render(snapshot),
        }
    }
}
