use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::diagnose::Diagnosis;

/// Inbound diagnose request from the orchestrator.
#[derive(Debug, Deserialize)]
pub struct DiagnoseRequest {
    /// State node id from the knowledge graph (e.g. "low_rest").
    pub state: String,
    /// Identifier for the user, agent session, or device.
    #[serde(default = "default_entity")]
    pub entity: String,
}

fn default_entity() -> String {
    "local_user".to_string()
}

/// Outbound diagnose response: always a consistent, predictable shape.
#[derive(Debug, Serialize)]
pub struct DiagnoseResponse {
    pub entity: String,
    pub state: String,
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub diagnosis: Diagnosis,
}

/// Query parameters for GET /traverse.
#[derive(Debug, Deserialize)]
pub struct TraverseParams {
    pub root: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    2
}

/// Query parameters for GET /suggestions.
#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    0.35
}

/// Explicit node upsert (admin operation).
#[derive(Debug, Deserialize)]
pub struct NodeUpsertRequest {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Edge reference for explicit deletion.
#[derive(Debug, Deserialize)]
pub struct EdgeRef {
    pub source: String,
    pub target: String,
    pub relation: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub nodes: i64,
    pub edges: i64,
}
