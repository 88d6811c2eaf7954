//! Layered network topology derived from an inventory snapshot.
//!
//! Devices are bucketed into architectural layers by role and name, a fixed
//! edge set is derived between the layers, and [`render`] turns the result
//! into a Mermaid diagram. Everything here is a pure function of its input:
//! the same devices, segments and VLANs in the same order always produce the
//! same snapshot and byte-identical diagram text.

pub mod render;
pub mod report;

use serde::{Deserialize, Serialize};

use crate::domain::inventory::{InventoryDevice, NetworkSegment, Vlan};

pub use render::render;
pub use report::{TopologyLayers, TopologyReport, TopologySummary};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Perimeter,
    Core,
    Distribution,
    Access,
    Security,
    Unclassified,
}

impl Layer {
    /// Layers that appear in the diagram, top to bottom.
    pub const DIAGRAM_ORDER: [Layer; 5] =
        [Layer::Perimeter, Layer::Core, Layer::Distribution, Layer::Security, Layer::Access];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Perimeter => "perimeter",
            Self::Core => "core",
            Self::Distribution => "distribution",
            Self::Access => "access",
            Self::Security => "security",
            Self::Unclassified => "unclassified",
        }
    }
}

/// First matching rule wins. Matching is a case-insensitive substring test on
/// the device role and name.
pub fn classify(device: &InventoryDevice) -> Layer {
    let role = device.role.to_ascii_lowercase();
    let name = device.name.to_ascii_lowercase();

    if role.contains("firewall") && name.contains("perimeter") {
        Layer::Perimeter
    } else if role.contains("router") || role.contains("core") {
        Layer::Core
    } else if role.contains("distribution") {
        Layer::Distribution
    } else if role.contains("access") {
        Layer::Access
    } else if role.contains("firewall") && name.contains("internal") {
        Layer::Security
    } else {
        Layer::Unclassified
    }
}

/// Every input device paired with exactly one layer, in input order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerAssignment {
    devices: Vec<InventoryDevice>,
    layers: Vec<Layer>,
}

impl LayerAssignment {
    pub fn classify_all(devices: Vec<InventoryDevice>) -> Self {
        let layers = devices.iter().map(classify).collect();
        Self { devices, layers }
    }

    pub fn devices(&self) -> &[InventoryDevice] {
        &self.devices
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InventoryDevice, Layer)> {
        self.devices.iter().zip(self.layers.iter().copied())
    }

    /// Devices of one layer in input order.
    pub fn bucket(&self, layer: Layer) -> Vec<&InventoryDevice> {
        self.iter().filter(|(_, assigned)| *assigned == layer).map(|(device, _)| device).collect()
    }

    pub fn count(&self, layer: Layer) -> usize {
        self.layers.iter().filter(|assigned| **assigned == layer).count()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// Position within the layer's bucket.
    Device { layer: Layer, index: usize },
    Segment(usize),
}

impl NodeRef {
    fn device(layer: Layer, index: usize) -> Self {
        Self::Device { layer, index }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Trunk,
    Ibgp,
    L3,
    Vpc,
    Uplink,
    BelongsTo,
}

impl EdgeKind {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::Trunk => Some("trunk"),
            Self::Ibgp => Some("iBGP"),
            Self::L3 => Some("L3"),
            Self::Vpc => Some("vPC"),
            Self::Uplink => None,
            Self::BelongsTo => Some("belongs to"),
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        matches!(self, Self::Ibgp | Self::Vpc)
    }

    pub fn is_dashed(&self) -> bool {
        matches!(self, Self::BelongsTo)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TopologyEdge {
    pub from: NodeRef,
    pub to: NodeRef,
    pub kind: EdgeKind,
}

/// Built fresh for every topology request and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopologySnapshot {
    layers: LayerAssignment,
    segments: Vec<NetworkSegment>,
    vlans: Vec<Vlan>,
    edges: Vec<TopologyEdge>,
}

impl TopologySnapshot {
    pub fn build(
        devices: Vec<InventoryDevice>,
        segments: Vec<NetworkSegment>,
        vlans: Vec<Vlan>,
    ) -> Self {
        let layers = LayerAssignment::classify_all(devices);
        let edges = derive_edges(&layers, segments.len());
        Self { layers, segments, vlans, edges }
    }

    pub fn layers(&self) -> &LayerAssignment {
        &self.layers
    }

    pub fn segments(&self) -> &[NetworkSegment] {
        &self.segments
    }

    pub fn vlans(&self) -> &[Vlan] {
        &self.vlans
    }

    pub fn edges(&self) -> &[TopologyEdge] {
        &self.edges
    }

    pub fn report(&self) -> TopologyReport {
        TopologyReport::from_snapshot(self)
    }
}

fn derive_edges(layers: &LayerAssignment, segment_count: usize) -> Vec<TopologyEdge> {
    let perimeter = layers.count(Layer::Perimeter);
    let core = layers.count(Layer::Core);
    let distribution = layers.count(Layer::Distribution);
    let security = layers.count(Layer::Security);
    let access = layers.count(Layer::Access);

    let mut edges = Vec::new();
    let mut link = |from: NodeRef, to: NodeRef, kind: EdgeKind| {
        edges.push(TopologyEdge { from, to, kind });
    };

    for p in 0..perimeter {
        for c in 0..core {
            link(NodeRef::device(Layer::Perimeter, p), NodeRef::device(Layer::Core, c), EdgeKind::Trunk);
        }
    }

    if core >= 2 {
        link(NodeRef::device(Layer::Core, 0), NodeRef::device(Layer::Core, 1), EdgeKind::Ibgp);
    }

    for index in 0..2 {
        if index < core && index < distribution {
            link(
                NodeRef::device(Layer::Core, index),
                NodeRef::device(Layer::Distribution, index),
                EdgeKind::L3,
            );
        }
    }

    if distribution >= 2 {
        link(
            NodeRef::device(Layer::Distribution, 0),
            NodeRef::device(Layer::Distribution, 1),
            EdgeKind::Vpc,
        );
    }

    if security > 0 {
        for d in 0..distribution {
            for s in 0..security {
                link(
                    NodeRef::device(Layer::Distribution, d),
                    NodeRef::device(Layer::Security, s),
                    EdgeKind::Uplink,
                );
            }
        }
        for s in 0..security {
            for a in 0..access {
                link(
                    NodeRef::device(Layer::Security, s),
                    NodeRef::device(Layer::Access, a),
                    EdgeKind::Uplink,
                );
            }
        }
    } else {
        for d in 0..distribution {
            for a in 0..access {
                link(
                    NodeRef::device(Layer::Distribution, d),
                    NodeRef::device(Layer::Access, a),
                    EdgeKind::Uplink,
                );
            }
        }
    }

    if access > 0 {
        for segment in 0..segment_count {
            link(
                NodeRef::device(Layer::Access, segment % access),
                NodeRef::Segment(segment),
                EdgeKind::BelongsTo,
            );
        }
    }

    edges
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::inventory::{InventoryDevice, NetworkSegment, Vlan};

    pub fn device(name: &str, role: &str, device_type: &str) -> InventoryDevice {
        InventoryDevice::new(name, device_type, role, "Data Center A", "active")
    }

    /// The reference data center: one perimeter firewall, two core routers,
    /// two distribution and three access switches.
    pub fn data_center() -> Vec<InventoryDevice> {
        vec![
            device("fw-perimeter-01", "Firewall", "ASA 5506-X"),
            device("core-rtr-01", "Core Router", "CSR1000v"),
            device("core-rtr-02", "Core Router", "CSR1000v"),
            device("dist-sw-01", "Distribution Switch", "Catalyst 9300"),
            device("dist-sw-02", "Distribution Switch", "Catalyst 9300"),
            device("access-sw-01", "Access Switch", "EX4300"),
            device("access-sw-02", "Access Switch", "EX4300"),
            device("access-sw-03", "Access Switch", "EX4300"),
        ]
    }

    pub fn segments() -> Vec<NetworkSegment> {
        vec![
            NetworkSegment::new("10.0.0.0/24", "Management").with_ip_count(8),
            NetworkSegment::new("10.0.10.0/24", "Users").with_ip_count(3),
            NetworkSegment::new("10.0.20.0/24", "Servers"),
            NetworkSegment::new("10.0.30.0/24", "Voice"),
        ]
    }

    pub fn vlans() -> Vec<Vlan> {
        vec![
            Vlan { vid: 10, name: "MGMT".to_string(), status: "active".to_string(), site: String::new() },
            Vlan { vid: 20, name: "USERS".to_string(), status: "active".to_string(), site: String::new() },
        ]
    }
}
