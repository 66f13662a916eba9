//! Graphviz DOT export for external rendering tools.

use std::fmt::Write as _;

use crate::graph::{GraphDocument, RelationKind};

/// Fill color per node label, mirroring the category palette used by the
/// companion visualizer.
fn label_color(label: &str) -> &'static str {
    match label {
        "system_state" => "orange",
        "stressor" | "physiological_marker" => "lightcoral",
        "cognitive_condition" => "gold",
        "behavioral_risk" => "red",
        "habit" => "khaki",
        "intervention" | "protection_state" => "lightgreen",
        "system_metric" => "skyblue",
        _ => "gray",
    }
}

fn kind_color(kind: RelationKind) -> &'static str {
    match kind {
        RelationKind::Causes => "black",
        RelationKind::Exacerbates => "darkred",
        RelationKind::Protects => "darkgreen",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Render a graph document as Graphviz DOT text. Nodes are colored by
/// label, edges by relation kind, with weights as edge labels.
pub fn to_dot(doc: &GraphDocument) -> String {
    let mut out = String::new();
    let name = doc.system_id.as_deref().unwrap_or("braingraph");
    let _ = writeln!(out, "digraph \"{}\" {{", escape(name));
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [style=filled, shape=ellipse];");

    for node in &doc.nodes {
        let _ = writeln!(
            out,
            "  \"{}\" [fillcolor={}, label=\"{}\\n({})\"];",
            escape(&node.id),
            label_color(&node.label),
            escape(&node.id),
            escape(&node.label)
        );
    }

    for edge in &doc.edges {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{} ({:.2})\", color={}];",
            escape(&edge.source),
            escape(&edge.target),
            edge.kind,
            edge.weight,
            kind_color(edge.kind)
        );
    }

    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node};

    #[test]
    fn test_dot_contains_nodes_and_edges() {
        let doc = GraphDocument {
            system_id: Some("wellness_brain".to_string()),
            metadata: Default::default(),
            nodes: vec![
                Node::new("stress", "stressor"),
                Node::new("overspending", "behavioral_risk"),
            ],
            edges: vec![Edge {
                source: "stress".into(),
                target: "overspending".into(),
                kind: RelationKind::Exacerbates,
                weight: 1.25,
                updated_at: String::new(),
            }],
        };

        let dot = to_dot(&doc);
        assert!(dot.starts_with("digraph \"wellness_brain\""));
        assert!(dot.contains("\"stress\" [fillcolor=lightcoral"));
        assert!(dot.contains("\"stress\" -> \"overspending\""));
        assert!(dot.contains("exacerbates (1.25)"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_escapes_quotes() {
        let doc = GraphDocument {
            nodes: vec![Node::new("odd\"id", "habit")],
            ..Default::default()
        };
        let dot = to_dot(&doc);
        assert!(dot.contains("odd\\\"id"));
    }
}
