//! Knowledge graph core: node/edge model, durable store, traversal,
//! diagnosis, link suggestion, and export.
//!
//! Nodes are wellness entities (stressors, habits, interventions); edges are
//! typed, weighted relations reinforced by feedback events.

pub mod store;
pub mod seed;
pub mod traversal;
pub mod diagnose;
pub mod linker;
pub mod export;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BrainError;

/// Default label for nodes created implicitly by an edge reference.
pub const DEFAULT_LABEL: &str = "uncategorized";

/// Relation kind between two nodes. Closed set; anything else is rejected
/// at ingress as an invalid event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Causes,
    Exacerbates,
    Protects,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Causes => "causes",
            RelationKind::Exacerbates => "exacerbates",
            RelationKind::Protects => "protects",
        }
    }

    pub const ALL: [RelationKind; 3] = [
        RelationKind::Causes,
        RelationKind::Exacerbates,
        RelationKind::Protects,
    ];
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationKind {
    type Err = BrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "causes" => Ok(RelationKind::Causes),
            "exacerbates" => Ok(RelationKind::Exacerbates),
            "protects" => Ok(RelationKind::Protects),
            other => Err(BrainError::InvalidEvent(format!(
                "unknown relation kind: '{}' (expected causes, exacerbates, or protects)",
                other
            ))),
        }
    }
}

/// An entity in the knowledge graph (a stressor, habit, or intervention).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    /// Category, e.g. "stressor", "habit", "intervention".
    #[serde(default = "default_label")]
    pub label: String,
    /// Free-form string metadata (description, notes, source).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

impl Node {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// A typed, weighted relation between two nodes.
/// At most one edge exists per (source, target, kind) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub weight: f64,
    /// RFC 3339 timestamp of the last weight adjustment.
    pub updated_at: String,
}

/// Key identifying a unique edge. Feedback on the same key is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} ({})", self.source, self.target, self.kind)
    }
}

/// The human-editable JSON graph document: the seed format at startup and
/// the snapshot format on export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_roundtrip() {
        for kind in RelationKind::ALL {
            let parsed: RelationKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_relation_kind_case_insensitive() {
        let parsed: RelationKind = " Exacerbates ".parse().unwrap();
        assert_eq!(parsed, RelationKind::Exacerbates);
    }

    #[test]
    fn test_relation_kind_rejects_unknown() {
        let err = "triggers".parse::<RelationKind>().unwrap_err();
        assert!(matches!(err, BrainError::InvalidEvent(_)));
    }

    #[test]
    fn test_node_serde_defaults() {
        let node: Node = serde_json::from_str(r#"{"id": "stress"}"#).unwrap();
        assert_eq!(node.id, "stress");
        assert_eq!(node.label, DEFAULT_LABEL);
        assert!(node.metadata.is_empty());
    }

    #[test]
    fn test_graph_document_parses_bare() {
        let doc: GraphDocument =
            serde_json::from_str(r#"{"nodes": [], "edges": []}"#).unwrap();
        assert!(doc.system_id.is_none());
        assert!(doc.nodes.is_empty());
    }

    #[test]
    fn test_edge_kind_serializes_lowercase() {
        let edge = Edge {
            source: "a".into(),
            target: "b".into(),
            kind: RelationKind::Protects,
            weight: 1.0,
            updated_at: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_string(&edge).unwrap();
        assert!(json.contains("\"protects\""));
    }
}
