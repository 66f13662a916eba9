//! Seed auto-reload: notify + debounce on the seed document.
//!
//! Editors replace files rather than rewriting them in place, so the watch
//! is placed on the parent directory and filtered down to the seed file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use notify::{RecursiveMode, Watcher};

use crate::error::{BrainError, Result};
use crate::graph::seed;
use crate::graph::store::GraphStore;

/// Run the watcher thread: watch the seed file's directory and send a
/// debounced signal over `tx` whenever the seed file changes. Exits when
/// the receiver is dropped or on watcher error.
pub fn run_watcher_thread(
    seed_path: &Path,
    debounce_ms: u64,
    tx: mpsc::Sender<PathBuf>,
) -> Result<()> {
    let seed_path = seed_path.to_path_buf();
    let watch_dir = seed_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let debounce = Duration::from_millis(debounce_ms);

    let (event_tx, event_rx) = mpsc::channel::<Vec<PathBuf>>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(ev) = res {
            let _ = event_tx.send(ev.paths);
        }
    })
    .map_err(|e| BrainError::Config(e.to_string()))?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|e| BrainError::Config(e.to_string()))?;

    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        match event_rx.recv_timeout(debounce) {
            Ok(paths) => {
                let now = Instant::now();
                for p in paths {
                    if hits_seed(&p, &seed_path) {
                        pending.insert(p, now);
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                let ready: Vec<_> = pending
                    .iter()
                    .filter(|(_, t)| now.duration_since(**t) >= debounce)
                    .map(|(p, _)| p.clone())
                    .collect();
                for p in &ready {
                    pending.remove(p);
                }
                for p in ready {
                    if tx.send(p).is_err() {
                        return Ok(());
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}

/// An event path matches the seed when the file name agrees. Comparing
/// full paths is unreliable: notify may report absolute paths while the
/// config holds a relative one.
fn hits_seed(event_path: &Path, seed_path: &Path) -> bool {
    match (event_path.file_name(), seed_path.file_name()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Watch the seed document and re-import it into the store on every
/// debounced change. A reload replaces the graph wholesale; a corrupt
/// seed is logged and the previous graph stays live.
pub async fn watch_seed(
    store: Arc<GraphStore>,
    seed_path: PathBuf,
    debounce_ms: u64,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<PathBuf>();

    let thread_path = seed_path.clone();
    std::thread::spawn(move || {
        if let Err(e) = run_watcher_thread(&thread_path, debounce_ms, tx) {
            log::error!("Seed watcher stopped: {}", e);
        }
    });

    log::info!("Watching seed document {} for changes", seed_path.display());

    let mut rx = rx;
    loop {
        let received = tokio::task::spawn_blocking(move || {
            let result = rx.recv();
            (rx, result)
        })
        .await
        .map_err(|e| BrainError::StoreUnavailable(format!("watcher task failed: {}", e)))?;
        rx = received.0;
        let changed = match received.1 {
            Ok(path) => path,
            Err(_) => break,
        };

        log::info!("Seed document changed: {}", changed.display());
        match seed::load_document(&seed_path) {
            Ok(doc) => match store.import_document(doc, true).await {
                Ok((nodes, edges)) => {
                    log::info!("Graph reloaded from seed: {} nodes, {} edges", nodes, edges)
                }
                Err(e) => log::error!("Seed reload failed, keeping current graph: {}", e),
            },
            Err(e) => log::error!("Seed document unreadable, keeping current graph: {}", e),
        }
    }

    Ok(())
}
