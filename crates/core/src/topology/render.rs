use crate::domain::inventory::{InventoryDevice, NetworkSegment};

use super::{Layer, NodeRef, TopologyEdge, TopologySnapshot};

const INDENT: &str = "    ";

/// Renders the snapshot as a Mermaid `graph TB` block: one subgraph per
/// non-empty layer, the segment block, the edges, then style annotations.
/// Unclassified devices are left out.
pub fn render(snapshot: &TopologySnapshot) -> String {
    let mut lines = vec!["graph TB".to_string()];

    for layer in Layer::DIAGRAM_ORDER {
        let devices = snapshot.layers().bucket(layer);
        if devices.is_empty() {
            continue;
        }
        let (id, title) = subgraph_heading(layer);
        lines.push(format!("{INDENT}subgraph {id}[\"{title}\"]"));
        for (index, device) in devices.iter().enumerate() {
            lines.push(format!(
                "{INDENT}{INDENT}{}[\"{}\"]",
                node_id(NodeRef::Device { layer, index }),
                device_label(device)
            ));
        }
        lines.push(format!("{INDENT}end"));
    }

    if !snapshot.segments().is_empty() {
        lines.push(format!("{INDENT}subgraph Segments[\"Network Segments\"]"));
        for (index, segment) in snapshot.segments().iter().enumerate() {
            lines.push(format!(
                "{INDENT}{INDENT}{}[\"{}\"]",
                node_id(NodeRef::Segment(index)),
                segment_label(segment)
            ));
        }
        lines.push(format!("{INDENT}end"));
    }

    for edge in snapshot.edges() {
        lines.push(format!("{INDENT}{}", render_edge(edge)));
    }

    for layer in Layer::DIAGRAM_ORDER {
        let count = snapshot.layers().count(layer);
        if count == 0 {
            continue;
        }
        let ids: Vec<String> =
            (0..count).map(|index| node_id(NodeRef::Device { layer, index })).collect();
        lines.push(format!("{INDENT}classDef {} {}", layer.as_str(), layer_style(layer)));
        lines.push(format!("{INDENT}class {} {}", ids.join(","), layer.as_str()));
    }

    if !snapshot.segments().is_empty() {
        let ids: Vec<String> =
            (0..snapshot.segments().len()).map(|index| node_id(NodeRef::Segment(index))).collect();
        lines.push(format!("{INDENT}classDef segment {SEGMENT_STYLE}"));
        lines.push(format!("{INDENT}class {} segment", ids.join(",")));
    }

    lines.join("\n")
}

const SEGMENT_STYLE: &str = "fill:#f1f3f4,stroke:#5f6368,stroke-dasharray:4 2";

fn subgraph_heading(layer: Layer) -> (&'static str, &'static str) {
    match layer {
        Layer::Perimeter => ("Perimeter", "Perimeter Layer"),
        Layer::Core => ("Core", "Core Layer"),
        Layer::Distribution => ("Distribution", "Distribution Layer"),
        Layer::Security => ("Security", "Security Layer"),
        Layer::Access => ("Access", "Access Layer"),
        Layer::Unclassified => ("Unclassified", "Unclassified"),
    }
}

fn layer_style(layer: Layer) -> &'static str {
    match layer {
        Layer::Perimeter => "fill:#fdecea,stroke:#c0392b",
        Layer::Core => "fill:#e8f0fe,stroke:#1a73e8",
        Layer::Distribution => "fill:#fef7e0,stroke:#f29900",
        Layer::Security => "fill:#f3e8fd,stroke:#8430ce",
        Layer::Access => "fill:#e6f4ea,stroke:#188038",
        Layer::Unclassified => "fill:#ffffff,stroke:#9aa0a6",
    }
}

fn node_id(node: NodeRef) -> String {
    match node {
        NodeRef::Device { layer, index } => {
            let prefix = match layer {
                Layer::Perimeter => "FW",
                Layer::Core => "CR",
                Layer::Distribution => "DS",
                Layer::Security => "SEC",
                Layer::Access => "AS",
                Layer::Unclassified => "UN",
            };
            format!("{prefix}{}", index + 1)
        }
        NodeRef::Segment(index) => format!("NET{}", index + 1),
    }
}

fn render_edge(edge: &TopologyEdge) -> String {
    let arrow = if edge.kind.is_dashed() {
        "-.->"
    } else if edge.kind.is_bidirectional() {
        "<-->"
    } else {
        "-->"
    };
    let from = node_id(edge.from);
    let to = node_id(edge.to);
    match edge.kind.label() {
        Some(label) => format!("{from} {arrow}|{label}| {to}"),
        None => format!("{from} {arrow} {to}"),
    }
}

fn device_label(device: &InventoryDevice) -> String {
    two_line_label(&device.name, &device.device_type)
}

fn segment_label(segment: &NetworkSegment) -> String {
    two_line_label(&segment.prefix, &segment.description)
}

fn two_line_label(first: &str, second: &str) -> String {
    let first = escape_label(first);
    let second = escape_label(second);
    if second.is_empty() {
        first
    } else {
        format!("{first}<br/>{second}")
    }
}

fn escape_label(value: &str) -> String {
    value.trim().replace('"', "#quot;").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use crate::domain::inventory::NetworkSegment;
    use crate::topology::fixtures::{data_center, device, segments, vlans};
    use crate::topology::{render, TopologySnapshot};

    #[test]
    fn small_topology_renders_exact_text() {
        let devices = vec![
            device("fw-perimeter-01", "Firewall", "ASA 5506-X"),
            device("core-rtr-01", "Core Router", "CSR1000v"),
            device("access-sw-01", "Access Switch", "EX4300"),
            device("srv-01", "Server", "R740"),
        ];
        let snapshot = TopologySnapshot::build(
            devices,
            vec![NetworkSegment::new("10.0.10.0/24", "Users")],
            Vec::new(),
        );

        let expected = [
            "graph TB",
            "    subgraph Perimeter[\"Perimeter Layer\"]",
            "        FW1[\"fw-perimeter-01<br/>ASA 5506-X\"]",
            "    end",
            "    subgraph Core[\"Core Layer\"]",
            "        CR1[\"core-rtr-01<br/>CSR1000v\"]",
            "    end",
            "    subgraph Access[\"Access Layer\"]",
            "        AS1[\"access-sw-01<br/>EX4300\"]",
            "    end",
            "    subgraph Segments[\"Network Segments\"]",
            "        NET1[\"10.0.10.0/24<br/>Users\"]",
            "    end",
            "    FW1 -->|trunk| CR1",
            "    AS1 -.->|belongs to| NET1",
            "    classDef perimeter fill:#fdecea,stroke:#c0392b",
            "    class FW1 perimeter",
            "    classDef core fill:#e8f0fe,stroke:#1a73e8",
            "    class CR1 core",
            "    classDef access fill:#e6f4ea,stroke:#188038",
            "    class AS1 access",
            "    classDef segment fill:#f1f3f4,stroke:#5f6368,stroke-dasharray:4 2",
            "    class NET1 segment",
        ]
        .join("\n");

        assert_eq!(render(&snapshot), expected);
    }

    #[test]
    fn rendering_is_deterministic() {
        let snapshot = TopologySnapshot::build(data_center(), segments(), vlans());
        let first = render(&snapshot);
        let second = render(&snapshot);
        assert_eq!(first, second);

        let rebuilt = TopologySnapshot::build(data_center(), segments(), vlans());
        assert_eq!(first, render(&rebuilt));
    }

    #[test]
    fn without_security_distribution_feeds_every_access_switch() {
        let snapshot = TopologySnapshot::build(data_center(), Vec::new(), Vec::new());
        let diagram = render(&snapshot);

        for distribution in ["DS1", "DS2"] {
            for access in ["AS1", "AS2", "AS3"] {
                let edge = format!("    {distribution} --> {access}");
                assert!(diagram.lines().any(|line| line == edge), "missing `{edge}`");
            }
        }
        assert!(!diagram.contains("subgraph Security"));
        assert!(!diagram.contains("SEC1"));
        assert!(diagram.contains("    CR1 <-->|iBGP| CR2"));
        assert!(diagram.contains("    DS1 <-->|vPC| DS2"));
        assert!(diagram.contains("    CR2 -->|L3| DS2"));
    }

    #[test]
    fn security_block_routes_access_uplinks() {
        let mut devices = data_center();
        devices.push(device("fw-internal-01", "Firewall", "vSRX"));
        let diagram = render(&TopologySnapshot::build(devices, Vec::new(), Vec::new()));

        assert!(diagram.contains("    subgraph Security[\"Security Layer\"]"));
        assert!(diagram.contains("    DS1 --> SEC1"));
        assert!(diagram.contains("    SEC1 --> AS3"));
        assert!(!diagram.contains("    DS1 --> AS1"));
    }

    #[test]
    fn empty_layers_and_unclassified_devices_are_omitted() {
        let devices = vec![
            device("access-sw-01", "Access Switch", "EX4300"),
            device("fw-dmz-01", "Firewall", "vSRX"),
        ];
        let diagram = render(&TopologySnapshot::build(devices, Vec::new(), Vec::new()));

        assert!(!diagram.contains("Perimeter"));
        assert!(!diagram.contains("Core"));
        assert!(!diagram.contains("Segments"));
        assert!(!diagram.contains("fw-dmz-01"));
        assert!(diagram.contains("AS1[\"access-sw-01<br/>EX4300\"]"));
    }

    #[test]
    fn labels_are_escaped() {
        let devices = vec![device("access \"lab\" sw", "Access Switch", "")];
        let diagram = render(&TopologySnapshot::build(devices, Vec::new(), Vec::new()));
        assert!(diagram.contains("AS1[\"access #quot;lab#quot; sw\"]"));
    }
}
