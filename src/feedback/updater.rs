//! The link updater: merges feedback events into the graph store under
//! per-edge-key serialization.
//!
//! Concurrent feedback on different edges proceeds in parallel; feedback on
//! the same (source, target, kind) triple is strictly ordered, so no update
//! is lost. The weight delta saturates as an edge approaches the configured
//! cap, keeping repeated identical feedback from reinforcing without bound.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use crate::config::FeedbackConfig;
use crate::error::{BrainError, Result};
use crate::feedback::{FeedbackEvent, RawFeedback};
use crate::graph::store::{self, GraphStore};
use crate::graph::{Edge, EdgeKey};

pub struct LinkUpdater {
    store: Arc<GraphStore>,
    learning_rate: f64,
    max_strength: f64,
    locks: Mutex<HashMap<EdgeKey, Arc<tokio::sync::Mutex<()>>>>,
}

/// Outcome of applying a batch: mutated edges plus per-event rejections.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub applied: Vec<Edge>,
    pub rejected: Vec<String>,
}

impl LinkUpdater {
    pub fn new(store: Arc<GraphStore>, feedback: &FeedbackConfig) -> Self {
        Self {
            store,
            learning_rate: feedback.learning_rate,
            max_strength: feedback.max_strength,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn max_strength(&self) -> f64 {
        self.max_strength
    }

    /// Saturating weight delta: `strength * rate * (1 - weight / cap)`.
    /// Monotonic in strength, diminishing as the edge approaches the cap,
    /// zero at the cap. Placeholder pending real requirements; constants
    /// are configurable.
    pub fn saturating_delta(&self, strength: f64, current_weight: f64) -> f64 {
        saturating_delta(
            strength,
            current_weight,
            self.learning_rate,
            self.store.weight_cap(),
        )
    }

    fn edge_lock(&self, key: &EdgeKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop our handle and evict the registry entry when no other task
    /// holds it. A concurrent claimant raises the strong count past the
    /// map's own reference and keeps the entry alive.
    fn release_edge_lock(&self, key: &EdgeKey, handle: Arc<tokio::sync::Mutex<()>>) {
        drop(handle);
        let mut locks = self.locks.lock().unwrap();
        if let Some(entry) = locks.get(key) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(key);
            }
        }
    }

    /// Validate and merge one feedback event. Returns the set of mutated
    /// edges: one edge normally, empty when the event id was already
    /// consumed (at-most-once).
    pub async fn apply_feedback(&self, raw: RawFeedback) -> Result<Vec<Edge>> {
        let event = raw.validate(self.max_strength)?;
        self.apply_event(event).await
    }

    /// Apply an already-validated event. The audit insert and the edge
    /// mutation commit in one transaction: either the event is consumed and
    /// its edge updated, or neither happened and a retry is safe.
    pub async fn apply_event(&self, event: FeedbackEvent) -> Result<Vec<Edge>> {
        let key = event.edge_key();
        let lock = self.edge_lock(&key);
        let guard = lock.lock().await;

        let merged = self.merge_event(&event).await;

        drop(guard);
        self.release_edge_lock(&key, lock);

        match merged? {
            Some(edge) => {
                log::info!(
                    "Feedback applied: {} (strength {:.3}, weight {:.3})",
                    key,
                    event.strength,
                    edge.weight
                );
                Ok(vec![edge])
            }
            None => {
                log::debug!("Feedback event {} already consumed, skipping", event.event_id);
                Ok(Vec::new())
            }
        }
    }

    /// One transaction: consume the event id and apply its edge mutation.
    /// Returns None when the id was already consumed. Caller must hold the
    /// edge-key lock.
    async fn merge_event(&self, event: &FeedbackEvent) -> Result<Option<Edge>> {
        // Referenced ids are created on first observation
        self.store.ensure_node(&event.source).await?;
        self.store.ensure_node(&event.target).await?;

        let learning_rate = self.learning_rate;
        let cap = self.store.weight_cap();
        let ev = event.clone();
        self.store
            .db()
            .with_connection(move |conn| {
                let tx = conn.transaction()?;

                let current = store::read_edge(&tx, &ev.source, &ev.target, ev.kind)?
                    .map(|e| e.weight)
                    .unwrap_or(0.0);
                let delta = saturating_delta(ev.strength, current, learning_rate, cap);

                // A duplicate id means the event was already consumed and
                // the mutation must not run again
                let affected = tx.execute(
                    "INSERT INTO feedback_events \
                     (event_id, received_at, source, target, kind, strength, provenance, applied_delta) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
                     ON CONFLICT(event_id) DO NOTHING",
                    params![
                        ev.event_id,
                        ev.received_at,
                        ev.source,
                        ev.target,
                        ev.kind.as_str(),
                        ev.strength,
                        ev.provenance,
                        delta
                    ],
                )?;
                if affected == 0 {
                    return Ok(None);
                }

                let weight = (current + delta).clamp(0.0, cap);
                let updated_at = Utc::now().to_rfc3339();
                tx.execute(
                    "INSERT INTO edges (source, target, kind, weight, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(source, target, kind) \
                     DO UPDATE SET weight = ?4, updated_at = ?5",
                    params![ev.source, ev.target, ev.kind.as_str(), weight, updated_at],
                )?;

                tx.commit()?;

                Ok(Some(Edge {
                    source: ev.source,
                    target: ev.target,
                    kind: ev.kind,
                    weight,
                    updated_at,
                }))
            })
            .await
    }

    /// Apply a batch of raw events. Invalid or failing events are reported
    /// in the outcome and do not abort the rest of the batch; store
    /// unavailability does, since nothing later can succeed.
    pub async fn apply_batch(&self, events: Vec<RawFeedback>) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        for raw in events {
            match self.apply_feedback(raw).await {
                Ok(edges) => outcome.applied.extend(edges),
                Err(e @ BrainError::StoreUnavailable(_)) => return Err(e),
                Err(e) => {
                    log::warn!("Feedback event rejected: {}", e);
                    outcome.rejected.push(e.to_string());
                }
            }
        }
        Ok(outcome)
    }
}

fn saturating_delta(strength: f64, current_weight: f64, learning_rate: f64, cap: f64) -> f64 {
    let headroom = (1.0 - current_weight / cap).max(0.0);
    strength * learning_rate * headroom
}
