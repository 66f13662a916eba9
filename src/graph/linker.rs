//! Link suggestion: TF-IDF cosine similarity over node text.
//!
//! Produces candidate pairs for review; nothing is merged into the store
//! here. Committing a suggestion goes through the normal feedback path so
//! every mutation stays explicit and audited.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use serde::Serialize;

use crate::graph::GraphDocument;

/// A candidate link between two semantically similar nodes.
#[derive(Debug, Clone, Serialize)]
pub struct LinkCandidate {
    pub source: String,
    pub target: String,
    pub similarity: f64,
}

/// Suggest links between node pairs whose TF-IDF cosine similarity meets
/// `threshold`. Pairs already connected in either direction (any kind) are
/// skipped. Results are ordered by similarity descending, then by ids.
pub fn suggest_links(doc: &GraphDocument, threshold: f64) -> Vec<LinkCandidate> {
    if doc.nodes.len() < 2 {
        return Vec::new();
    }

    let mut nodes: Vec<_> = doc.nodes.iter().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let corpus: Vec<HashMap<String, f64>> = nodes
        .iter()
        .map(|n| {
            let mut text = format!("{} {}", n.id, n.label);
            for value in n.metadata.values() {
                text.push(' ');
                text.push_str(value);
            }
            term_frequencies(&text)
        })
        .collect();

    // Smoothed inverse document frequency over the node corpus
    let n_docs = corpus.len() as f64;
    let mut doc_freq: HashMap<&str, f64> = HashMap::new();
    for tf in &corpus {
        for term in tf.keys() {
            *doc_freq.entry(term.as_str()).or_insert(0.0) += 1.0;
        }
    }
    let idf: HashMap<&str, f64> = doc_freq
        .iter()
        .map(|(term, df)| (*term, ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0))
        .collect();

    let vectors: Vec<HashMap<&str, f64>> = corpus
        .iter()
        .map(|tf| {
            let mut vec: HashMap<&str, f64> = tf
                .iter()
                .map(|(term, freq)| (term.as_str(), freq * idf[term.as_str()]))
                .collect();
            let norm = vec.values().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                for v in vec.values_mut() {
                    *v /= norm;
                }
            }
            vec
        })
        .collect();

    let connected: HashSet<(String, String)> = doc
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();

    let mut candidates = Vec::new();
    for i in 0..nodes.len() {
        for j in (i + 1)..nodes.len() {
            let a = &nodes[i].id;
            let b = &nodes[j].id;
            if connected.contains(&(a.clone(), b.clone()))
                || connected.contains(&(b.clone(), a.clone()))
            {
                continue;
            }
            let sim = cosine(&vectors[i], &vectors[j]);
            if sim >= threshold {
                candidates.push(LinkCandidate {
                    source: a.clone(),
                    target: b.clone(),
                    similarity: sim,
                });
            }
        }
    }

    candidates.sort_by(|x, y| {
        y.similarity
            .partial_cmp(&x.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| x.source.cmp(&y.source))
            .then_with(|| x.target.cmp(&y.target))
    });
    candidates
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    // Lazily compiled per call is fine at this scale; the corpus is small
    let token_re = Regex::new(r"[a-z0-9]+").expect("Invalid token pattern");
    let lowered = text.to_lowercase();
    let mut tf: HashMap<String, f64> = HashMap::new();
    let mut total = 0.0;
    for tok in token_re.find_iter(&lowered) {
        *tf.entry(tok.as_str().to_string()).or_insert(0.0) += 1.0;
        total += 1.0;
    }
    if total > 0.0 {
        for v in tf.values_mut() {
            *v /= total;
        }
    }
    tf
}

fn cosine(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
    // Vectors are already l2-normalized, so the dot product is the cosine
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, va)| large.get(term).map(|vb| va * vb))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Node, RelationKind};

    fn node_with_desc(id: &str, label: &str, desc: &str) -> Node {
        let mut node = Node::new(id, label);
        node.metadata
            .insert("description".to_string(), desc.to_string());
        node
    }

    fn sample_doc() -> GraphDocument {
        GraphDocument {
            system_id: None,
            metadata: Default::default(),
            nodes: vec![
                node_with_desc("late_caffeine", "habit", "evening coffee disrupts sleep quality"),
                node_with_desc("poor_sleep", "stressor", "low sleep quality and disrupted rest"),
                node_with_desc("budget_review", "intervention", "weekly spending plan checkup"),
            ],
            edges: vec![],
        }
    }

    #[test]
    fn test_similar_nodes_suggested() {
        let doc = sample_doc();
        let candidates = suggest_links(&doc, 0.1);
        assert!(!candidates.is_empty());
        let top = &candidates[0];
        // The two sleep-related nodes share vocabulary; budget_review does not
        assert!(
            (top.source == "late_caffeine" && top.target == "poor_sleep")
                || (top.source == "poor_sleep" && top.target == "late_caffeine")
        );
    }

    #[test]
    fn test_threshold_respected() {
        let doc = sample_doc();
        let candidates = suggest_links(&doc, 1.01);
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_connected_pairs_skipped() {
        let mut doc = sample_doc();
        doc.edges.push(Edge {
            source: "late_caffeine".into(),
            target: "poor_sleep".into(),
            kind: RelationKind::Causes,
            weight: 1.0,
            updated_at: String::new(),
        });
        let candidates = suggest_links(&doc, 0.1);
        assert!(!candidates
            .iter()
            .any(|c| c.source == "late_caffeine" && c.target == "poor_sleep"));
    }

    #[test]
    fn test_reverse_edge_also_skips_pair() {
        let mut doc = sample_doc();
        doc.edges.push(Edge {
            source: "poor_sleep".into(),
            target: "late_caffeine".into(),
            kind: RelationKind::Exacerbates,
            weight: 1.0,
            updated_at: String::new(),
        });
        let candidates = suggest_links(&doc, 0.1);
        assert!(!candidates
            .iter()
            .any(|c| c.source == "late_caffeine" && c.target == "poor_sleep"));
    }

    #[test]
    fn test_single_node_no_candidates() {
        let doc = GraphDocument {
            nodes: vec![Node::new("solo", "habit")],
            ..Default::default()
        };
        assert!(suggest_links(&doc, 0.0).is_empty());
    }

    #[test]
    fn test_deterministic_ordering() {
        let doc = sample_doc();
        let a = suggest_links(&doc, 0.0);
        let b = suggest_links(&doc, 0.0);
        let pairs_a: Vec<_> = a.iter().map(|c| (c.source.clone(), c.target.clone())).collect();
        let pairs_b: Vec<_> = b.iter().map(|c| (c.source.clone(), c.target.clone())).collect();
        assert_eq!(pairs_a, pairs_b);
    }
}
