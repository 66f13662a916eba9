//! Deterministic diagnosis: given a state node, report downstream risks,
//! safe-mode reachability, and a readable reasoning trace.

use serde::Serialize;

use crate::error::{BrainError, Result};
use crate::graph::store::GraphStore;
use crate::graph::traversal::{is_reachable, traverse};
use crate::graph::RelationKind;

/// Depth of the reasoning trace included in a diagnosis.
const REASONING_DEPTH: usize = 2;

/// A directly connected downstream risk.
#[derive(Debug, Clone, Serialize)]
pub struct RiskDetail {
    pub risk: String,
    pub relation: RelationKind,
    pub weight: f64,
}

/// The structured outcome of diagnosing a state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Diagnosis {
    Ok {
        current_state: String,
        predicted_risks: Vec<RiskDetail>,
        activates_safe_mode: bool,
        reasoning_path: Vec<String>,
    },
    /// The state is not mapped in the graph. Graceful outcome, not an error:
    /// the orchestrator still gets a well-formed response to relay.
    UnknownState { state: String },
}

/// Diagnose a state node: direct successors become predicted risks, and
/// reachability of `safety_node` decides whether safe mode activates.
pub async fn diagnose(
    store: &GraphStore,
    state_id: &str,
    safety_node: &str,
) -> Result<Diagnosis> {
    match store.get_node(state_id).await {
        Ok(_) => {}
        Err(BrainError::NodeNotFound(_)) => {
            log::warn!("Diagnosis requested for unknown state: {}", state_id);
            return Ok(Diagnosis::UnknownState {
                state: state_id.to_string(),
            });
        }
        Err(e) => return Err(e),
    }

    let mut predicted_risks = Vec::new();
    for edge in store.edges_from(state_id).await? {
        predicted_risks.push(RiskDetail {
            risk: edge.target,
            relation: edge.kind,
            weight: edge.weight,
        });
    }

    let activates_safe_mode = is_reachable(store, state_id, safety_node).await?;

    let mut reasoning_path = Vec::new();
    for step in traverse(store, state_id, REASONING_DEPTH).await? {
        if let Some(edge) = &step.edge {
            reasoning_path.push(format!(
                "{} --[{}]--> {}",
                edge.source, edge.kind, edge.target
            ));
        }
    }

    Ok(Diagnosis::Ok {
        current_state: state_id.to_string(),
        predicted_risks,
        activates_safe_mode,
        reasoning_path,
    })
}
