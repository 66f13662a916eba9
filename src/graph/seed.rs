//! Seed document I/O: the human-editable JSON graph file loaded at startup
//! and written back by the export tooling.

use std::fs;
use std::path::Path;

use crate::error::{BrainError, Result};
use crate::graph::GraphDocument;

/// Load a graph document from disk. Fails with Parse on malformed JSON.
pub fn load_document(path: &Path) -> Result<GraphDocument> {
    let raw = fs::read_to_string(path).map_err(BrainError::Io)?;
    serde_json::from_str(&raw).map_err(|e| {
        BrainError::Parse(format!("invalid graph document {}: {}", path.display(), e))
    })
}

/// Load a graph document, falling back to an empty graph when the file is
/// missing. Malformed JSON is still an error so a corrupted seed never
/// silently wipes the graph.
pub fn load_or_default(path: &Path) -> Result<GraphDocument> {
    if !path.exists() {
        log::warn!("Seed document {} not found, starting empty", path.display());
        return Ok(GraphDocument::default());
    }
    load_document(path)
}

/// Write a graph document to disk as indented JSON.
pub fn write_document(path: &Path, doc: &GraphDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| BrainError::Parse(e.to_string()))?;
    fs::write(path, json).map_err(BrainError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, RelationKind};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let doc = load_or_default(&tmp.path().join("missing.json")).unwrap();
        assert!(doc.nodes.is_empty());
        assert!(doc.edges.is_empty());
    }

    #[test]
    fn test_load_rejects_corrupt_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_or_default(&path).unwrap_err();
        assert!(matches!(err, BrainError::Parse(_)));
    }

    #[test]
    fn test_write_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("graph.json");

        let mut doc = GraphDocument::default();
        doc.system_id = Some("wellness_brain".to_string());
        doc.nodes.push(Node::new("stress", "stressor"));
        doc.edges.push(crate::graph::Edge {
            source: "stress".into(),
            target: "overspending".into(),
            kind: RelationKind::Exacerbates,
            weight: 1.0,
            updated_at: "2026-01-01T00:00:00Z".into(),
        });

        write_document(&path, &doc).unwrap();
        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.system_id.as_deref(), Some("wellness_brain"));
        assert_eq!(loaded.nodes.len(), 1);
        assert_eq!(loaded.edges[0].kind, RelationKind::Exacerbates);
    }
}
