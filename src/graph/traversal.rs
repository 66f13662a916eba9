//! BFS graph traversal, cycle-safe and deterministic.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;

use crate::error::Result;
use crate::graph::store::GraphStore;
use crate::graph::{Edge, Node};

/// One step of a breadth-first traversal. The root appears at depth 0 with
/// no incoming edge; every other step carries the edge it was reached by.
#[derive(Debug, Clone, Serialize)]
pub struct TraversalStep {
    pub node: Node,
    pub edge: Option<Edge>,
    pub depth: usize,
}

/// Traverse the graph breadth-first from `root`, following outgoing edges
/// up to `max_depth` hops. Never revisits a node id; neighbor expansion is
/// ordered by (target, kind) so results are deterministic. Fails with
/// NodeNotFound when the root is absent; `max_depth = 0` returns exactly
/// the root.
pub async fn traverse(
    store: &GraphStore,
    root: &str,
    max_depth: usize,
) -> Result<Vec<TraversalStep>> {
    let root_node = store.get_node(root).await?;

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let mut steps = Vec::new();

    visited.insert(root_node.id.clone());
    steps.push(TraversalStep {
        node: root_node,
        edge: None,
        depth: 0,
    });
    queue.push_back((root.to_string(), 0usize));

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        // edges_from is already ordered by (target, kind)
        for edge in store.edges_from(&id).await? {
            if visited.contains(&edge.target) {
                continue;
            }
            visited.insert(edge.target.clone());
            let node = store.get_node(&edge.target).await?;
            queue.push_back((edge.target.clone(), depth + 1));
            steps.push(TraversalStep {
                node,
                edge: Some(edge),
                depth: depth + 1,
            });
        }
    }

    Ok(steps)
}

/// True when `target` is reachable from `root` by any directed path.
pub async fn is_reachable(store: &GraphStore, root: &str, target: &str) -> Result<bool> {
    if root == target {
        return store.get_node(root).await.map(|_| true);
    }

    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(root.to_string());
    queue.push_back(root.to_string());

    while let Some(id) = queue.pop_front() {
        for edge in store.edges_from(&id).await? {
            if edge.target == target {
                return Ok(true);
            }
            if visited.insert(edge.target.clone()) {
                queue.push_back(edge.target);
            }
        }
    }

    Ok(false)
}
