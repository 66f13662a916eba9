//! Line-delimited feedback listener (stdin transport).
//!
//! Hosts that pipe events instead of POSTing them write one JSON payload
//! per line; the listener answers with one JSON result per line on stdout.
//! Malformed lines are reported and skipped; the loop keeps serving.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

use crate::error::{BrainError, Result};
use crate::feedback::updater::LinkUpdater;
use crate::feedback::FeedbackPayload;

/// Process one input line into a JSON result value.
pub async fn process_line(updater: &LinkUpdater, line: &str) -> serde_json::Value {
    let payload: FeedbackPayload = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => {
            return serde_json::json!({
                "ok": false,
                "error": format!("Invalid feedback event: malformed JSON: {}", e),
            });
        }
    };

    match updater.apply_batch(payload.into_events()).await {
        Ok(outcome) => serde_json::json!({
            "ok": true,
            "applied": outcome.applied,
            "rejected": outcome.rejected,
        }),
        Err(e) => serde_json::json!({
            "ok": false,
            "error": e.to_string(),
        }),
    }
}

/// Run the listener until stdin reaches EOF.
pub async fn run(updater: Arc<LinkUpdater>) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = AsyncBufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    log::info!("Feedback listener started (line-delimited JSON on stdin)");

    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(BrainError::Io)?;

        // EOF - producer disconnected
        if bytes_read == 0 {
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let result = process_line(&updater, trimmed).await;
        let mut out = serde_json::to_string(&result)
            .map_err(|e| BrainError::Parse(e.to_string()))?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await.map_err(BrainError::Io)?;
        stdout.flush().await.map_err(BrainError::Io)?;
    }

    log::info!("Feedback listener stopped (stdin closed)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedbackConfig;
    use crate::graph::store::tests::test_store;

    async fn test_updater() -> (LinkUpdater, tempfile::TempDir) {
        let (store, tmp) = test_store().await;
        (
            LinkUpdater::new(Arc::new(store), &FeedbackConfig::default()),
            tmp,
        )
    }

    #[tokio::test]
    async fn test_process_line_single_event() {
        let (updater, _tmp) = test_updater().await;
        let result = process_line(
            &updater,
            r#"{"source": "stress", "target": "overspending", "relation": "exacerbates", "strength": 1}"#,
        )
        .await;

        assert_eq!(result["ok"], true);
        assert_eq!(result["applied"].as_array().unwrap().len(), 1);
        assert!(result["rejected"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_line_batch_with_rejects() {
        let (updater, _tmp) = test_updater().await;
        let result = process_line(
            &updater,
            r#"{"events": [
                {"source": "a", "target": "b", "relation": "causes", "strength": 1},
                {"source": "a", "target": "b", "relation": "nope", "strength": 1}
            ]}"#,
        )
        .await;

        assert_eq!(result["ok"], true);
        assert_eq!(result["applied"].as_array().unwrap().len(), 1);
        assert_eq!(result["rejected"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_process_line_malformed_json() {
        let (updater, _tmp) = test_updater().await;
        let result = process_line(&updater, "this is not json").await;
        assert_eq!(result["ok"], false);
        assert!(result["error"].as_str().unwrap().contains("malformed JSON"));
    }
}
