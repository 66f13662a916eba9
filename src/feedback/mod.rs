//! Feedback ingest: wire shapes, validation, the link updater, and the
//! line-delimited stdio listener.
//!
//! A feedback event is an external observation ("stress exacerbates
//! overspending, strength 1") that creates or reinforces an edge. Events
//! are validated at ingress, recorded immutably, and consumed exactly once.

pub mod updater;
pub mod listener;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BrainError, Result};
use crate::graph::{EdgeKey, RelationKind};

/// External wire shape of a feedback event, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeedback {
    /// Client-supplied idempotency key; generated when absent.
    #[serde(default)]
    pub event_id: Option<String>,
    pub source: String,
    pub target: String,
    pub relation: String,
    pub strength: f64,
    /// Who observed this (workflow id, user action, suggestion review).
    #[serde(default)]
    pub provenance: Option<String>,
}

/// Inbound payload: a single event or a grouped batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FeedbackPayload {
    Batch { events: Vec<RawFeedback> },
    Single(RawFeedback),
}

impl FeedbackPayload {
    pub fn into_events(self) -> Vec<RawFeedback> {
        match self {
            FeedbackPayload::Batch { events } => events,
            FeedbackPayload::Single(event) => vec![event],
        }
    }
}

/// A validated feedback event. Immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackEvent {
    pub event_id: String,
    pub received_at: String,
    pub source: String,
    pub target: String,
    pub kind: RelationKind,
    pub strength: f64,
    pub provenance: Option<String>,
}

impl FeedbackEvent {
    pub fn edge_key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            kind: self.kind,
        }
    }
}

impl RawFeedback {
    /// Validate the wire shape into a FeedbackEvent.
    /// Fails with InvalidEvent on empty ids, unknown relation kinds, or
    /// non-finite / non-positive / out-of-range strength.
    pub fn validate(self, max_strength: f64) -> Result<FeedbackEvent> {
        let source = self.source.trim().to_string();
        if source.is_empty() {
            return Err(BrainError::InvalidEvent("source id is empty".to_string()));
        }

        let target = self.target.trim().to_string();
        if target.is_empty() {
            return Err(BrainError::InvalidEvent("target id is empty".to_string()));
        }

        let kind: RelationKind = self.relation.parse()?;

        if !self.strength.is_finite() {
            return Err(BrainError::InvalidEvent(format!(
                "strength must be finite, got {}",
                self.strength
            )));
        }
        if self.strength <= 0.0 {
            return Err(BrainError::InvalidEvent(format!(
                "strength must be positive, got {}",
                self.strength
            )));
        }
        if self.strength > max_strength {
            return Err(BrainError::InvalidEvent(format!(
                "strength {} exceeds maximum {}",
                self.strength, max_strength
            )));
        }

        let event_id = match self.event_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => Uuid::new_v4().to_string(),
        };

        Ok(FeedbackEvent {
            event_id,
            received_at: Utc::now().to_rfc3339(),
            source,
            target,
            kind,
            strength: self.strength,
            provenance: self.provenance,
        })
    }
}
