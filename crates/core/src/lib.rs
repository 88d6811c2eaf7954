pub mod config;
pub mod domain;
pub mod errors;
pub mod topology;

pub use domain::inventory::{InventoryDevice, IpAddress, NetworkSegment, Site, Vlan};
pub use errors::AgentError;
pub use topology::{
    classify, render, EdgeKind, Layer, LayerAssignment, NodeRef, TopologyEdge, TopologyLayers,
    TopologyReport, TopologySnapshot, TopologySummary,
};
