//! Durable graph store: SQLite-backed nodes and edges with an LRU cache
//! for hot node reads.
//!
//! The store exclusively owns node and edge records. All mutations are
//! atomic per edge: a weight update is a single transaction, so readers
//! never observe a partial update.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::Utc;
use lru::LruCache;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Db;
use crate::error::{BrainError, Result};
use crate::graph::{Edge, GraphDocument, Node, RelationKind, DEFAULT_LABEL};

pub struct GraphStore {
    db: Db,
    weight_cap: f64,
    node_cache: Mutex<LruCache<String, Node>>,
}

impl GraphStore {
    /// Create a store over an already-migrated database.
    pub fn new(db: Db, weight_cap: f64, cache_capacity: usize) -> Self {
        let cap = NonZeroUsize::new(cache_capacity.max(1))
            .expect("Cache capacity must be at least 1");
        Self {
            db,
            weight_cap,
            node_cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Underlying database handle, for audit and stats queries.
    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn weight_cap(&self) -> f64 {
        self.weight_cap
    }

    /// Insert or update a node. Metadata keys are merged (new values win);
    /// an empty label leaves the stored label untouched.
    pub async fn upsert_node(
        &self,
        id: &str,
        label: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<Node> {
        let id = id.to_string();
        let label = label.to_string();
        let node = self
            .db
            .with_connection(move |conn| upsert_node_tx(conn, &id, &label, metadata))
            .await?;
        self.node_cache
            .lock()
            .unwrap()
            .put(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Create a node with the default label if it does not exist yet.
    /// Used by the link updater when an event references a new id.
    pub async fn ensure_node(&self, id: &str) -> Result<Node> {
        if let Some(node) = self.node_cache.lock().unwrap().get(id) {
            return Ok(node.clone());
        }
        let id_owned = id.to_string();
        let node = self
            .db
            .with_connection(move |conn| {
                if let Some(node) = read_node(conn, &id_owned)? {
                    return Ok(node);
                }
                upsert_node_tx(conn, &id_owned, DEFAULT_LABEL, BTreeMap::new())
            })
            .await?;
        self.node_cache
            .lock()
            .unwrap()
            .put(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Fetch a node by id. Fails with NodeNotFound on absence.
    pub async fn get_node(&self, id: &str) -> Result<Node> {
        if let Some(node) = self.node_cache.lock().unwrap().get(id) {
            return Ok(node.clone());
        }
        let id_owned = id.to_string();
        let node = self
            .db
            .with_connection(move |conn| {
                read_node(conn, &id_owned)?
                    .ok_or_else(|| BrainError::NodeNotFound(id_owned.clone()))
            })
            .await?;
        self.node_cache
            .lock()
            .unwrap()
            .put(node.id.clone(), node.clone());
        Ok(node)
    }

    /// Fetch a single edge, if present.
    pub async fn get_edge(
        &self,
        source: &str,
        target: &str,
        kind: RelationKind,
    ) -> Result<Option<Edge>> {
        let (source, target) = (source.to_string(), target.to_string());
        self.db
            .with_connection(move |conn| read_edge(conn, &source, &target, kind))
            .await
    }

    /// Create the edge if absent, else add `weight_delta` and refresh the
    /// timestamp. The resulting weight is clamped to `[0, weight_cap]`.
    /// Both endpoint nodes must already exist.
    pub async fn upsert_edge(
        &self,
        source: &str,
        target: &str,
        kind: RelationKind,
        weight_delta: f64,
    ) -> Result<Edge> {
        let (source, target) = (source.to_string(), target.to_string());
        let cap = self.weight_cap;
        self.db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;

                if !node_exists(&tx, &source)? {
                    return Err(BrainError::NodeNotFound(source));
                }
                if !node_exists(&tx, &target)? {
                    return Err(BrainError::NodeNotFound(target));
                }

                let current = read_edge(&tx, &source, &target, kind)?
                    .map(|e| e.weight)
                    .unwrap_or(0.0);
                let weight = (current + weight_delta).clamp(0.0, cap);
                let updated_at = Utc::now().to_rfc3339();

                tx.execute(
                    "INSERT INTO edges (source, target, kind, weight, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5) \
                     ON CONFLICT(source, target, kind) \
                     DO UPDATE SET weight = ?4, updated_at = ?5",
                    params![source, target, kind.as_str(), weight, updated_at],
                )?;

                tx.commit()?;

                Ok(Edge {
                    source,
                    target,
                    kind,
                    weight,
                    updated_at,
                })
            })
            .await
    }

    /// Outgoing edges of a node, ordered by (target, kind) for determinism.
    /// Fails with NodeNotFound when the node is absent.
    pub async fn edges_from(&self, id: &str) -> Result<Vec<Edge>> {
        let id_owned = id.to_string();
        self.db
            .with_connection(move |conn| {
                if !node_exists(conn, &id_owned)? {
                    return Err(BrainError::NodeNotFound(id_owned));
                }
                query_edges(
                    conn,
                    "SELECT source, target, kind, weight, updated_at FROM edges \
                     WHERE source = ?1 ORDER BY target, kind",
                    &id_owned,
                )
            })
            .await
    }

    /// Incoming edges of a node, ordered by (source, kind).
    pub async fn edges_to(&self, id: &str) -> Result<Vec<Edge>> {
        let id_owned = id.to_string();
        self.db
            .with_connection(move |conn| {
                if !node_exists(conn, &id_owned)? {
                    return Err(BrainError::NodeNotFound(id_owned));
                }
                query_edges(
                    conn,
                    "SELECT source, target, kind, weight, updated_at FROM edges \
                     WHERE target = ?1 ORDER BY source, kind",
                    &id_owned,
                )
            })
            .await
    }

    /// Delete a node and every edge touching it.
    pub async fn delete_node(&self, id: &str) -> Result<()> {
        let id_owned = id.to_string();
        self.db
            .with_connection(move |conn| {
                let affected = conn.execute("DELETE FROM nodes WHERE id = ?1", params![id_owned])?;
                if affected == 0 {
                    return Err(BrainError::NodeNotFound(id_owned));
                }
                Ok(())
            })
            .await?;
        self.node_cache.lock().unwrap().pop(id);
        Ok(())
    }

    /// Delete a single edge by its triple.
    pub async fn delete_edge(
        &self,
        source: &str,
        target: &str,
        kind: RelationKind,
    ) -> Result<()> {
        let (source, target) = (source.to_string(), target.to_string());
        self.db
            .with_connection(move |conn| {
                let affected = conn.execute(
                    "DELETE FROM edges WHERE source = ?1 AND target = ?2 AND kind = ?3",
                    params![source, target, kind.as_str()],
                )?;
                if affected == 0 {
                    return Err(BrainError::EdgeNotFound(
                        source,
                        target,
                        kind.as_str().to_string(),
                    ));
                }
                Ok(())
            })
            .await
    }

    /// Full dump for external rendering tools: nodes, edges, and the
    /// document header carried over from the last import.
    /// Read-only and snapshot-consistent (single transaction).
    pub async fn export_snapshot(&self) -> Result<GraphDocument> {
        self.db
            .with_connection(|conn| {
                let tx = conn.transaction()?;

                let mut nodes = Vec::new();
                {
                    let mut stmt = tx.prepare(
                        "SELECT id, label, metadata_json FROM nodes ORDER BY id",
                    )?;
                    let rows = stmt.query_map([], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })?;
                    for row in rows {
                        let (id, label, metadata_json) = row?;
                        nodes.push(Node {
                            id,
                            label,
                            metadata: parse_metadata(&metadata_json)?,
                        });
                    }
                }

                let edges = {
                    let mut stmt = tx.prepare(
                        "SELECT source, target, kind, weight, updated_at FROM edges \
                         ORDER BY source, target, kind",
                    )?;
                    let rows = stmt.query_map([], edge_from_row)?;
                    rows.collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?
                };

                let system_id: Option<String> = tx
                    .query_row(
                        "SELECT value FROM graph_meta WHERE key = 'system_id'",
                        [],
                        |row| row.get(0),
                    )
                    .optional()?;
                let metadata = match tx
                    .query_row(
                        "SELECT value FROM graph_meta WHERE key = 'metadata_json'",
                        [],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?
                {
                    Some(json) => parse_metadata(&json)?,
                    None => BTreeMap::new(),
                };

                Ok(GraphDocument {
                    system_id,
                    metadata,
                    nodes,
                    edges,
                })
            })
            .await
    }

    /// Import a graph document into the store. With `replace` the existing
    /// graph is dropped first; otherwise nodes merge and edge weights are
    /// overwritten by the document's values.
    pub async fn import_document(
        &self,
        doc: GraphDocument,
        replace: bool,
    ) -> Result<(usize, usize)> {
        let counts = self
            .db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;

                if replace {
                    tx.execute("DELETE FROM edges", [])?;
                    tx.execute("DELETE FROM nodes", [])?;
                    tx.execute("DELETE FROM graph_meta", [])?;
                }

                if let Some(system_id) = &doc.system_id {
                    tx.execute(
                        "INSERT INTO graph_meta (key, value) VALUES ('system_id', ?1) \
                         ON CONFLICT(key) DO UPDATE SET value = ?1",
                        params![system_id],
                    )?;
                }
                if !doc.metadata.is_empty() {
                    let metadata_json = serde_json::to_string(&doc.metadata)
                        .map_err(|e| BrainError::Parse(e.to_string()))?;
                    tx.execute(
                        "INSERT INTO graph_meta (key, value) VALUES ('metadata_json', ?1) \
                         ON CONFLICT(key) DO UPDATE SET value = ?1",
                        params![metadata_json],
                    )?;
                }

                let mut node_count = 0;
                for node in &doc.nodes {
                    if node.id.trim().is_empty() {
                        return Err(BrainError::Parse(
                            "seed document contains a node with an empty id".to_string(),
                        ));
                    }
                    upsert_node_tx(&tx, &node.id, &node.label, node.metadata.clone())?;
                    node_count += 1;
                }

                let mut edge_count = 0;
                for edge in &doc.edges {
                    // Endpoints referenced only by an edge are created on
                    // first reference, same as feedback ingest.
                    if read_node(&tx, &edge.source)?.is_none() {
                        upsert_node_tx(&tx, &edge.source, DEFAULT_LABEL, BTreeMap::new())?;
                    }
                    if read_node(&tx, &edge.target)?.is_none() {
                        upsert_node_tx(&tx, &edge.target, DEFAULT_LABEL, BTreeMap::new())?;
                    }
                    let updated_at = if edge.updated_at.is_empty() {
                        Utc::now().to_rfc3339()
                    } else {
                        edge.updated_at.clone()
                    };
                    tx.execute(
                        "INSERT INTO edges (source, target, kind, weight, updated_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5) \
                         ON CONFLICT(source, target, kind) \
                         DO UPDATE SET weight = ?4, updated_at = ?5",
                        params![
                            edge.source,
                            edge.target,
                            edge.kind.as_str(),
                            edge.weight,
                            updated_at
                        ],
                    )?;
                    edge_count += 1;
                }

                tx.commit()?;
                Ok((node_count, edge_count))
            })
            .await?;

        // Imported rows may shadow cached nodes
        self.node_cache.lock().unwrap().clear();
        Ok(counts)
    }

    /// Node and edge counts, for health reporting.
    pub async fn counts(&self) -> Result<(i64, i64)> {
        self.db
            .with_connection(|conn| {
                let nodes: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
                let edges: i64 = conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0))?;
                Ok((nodes, edges))
            })
            .await
    }
}

fn parse_metadata(json: &str) -> Result<BTreeMap<String, String>> {
    serde_json::from_str(json)
        .map_err(|e| BrainError::Parse(format!("invalid node metadata: {}", e)))
}

fn node_exists(conn: &Connection, id: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM nodes WHERE id = ?1")?;
    Ok(stmt.exists(params![id])?)
}

fn read_node(conn: &Connection, id: &str) -> Result<Option<Node>> {
    let row = conn
        .query_row(
            "SELECT id, label, metadata_json FROM nodes WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    match row {
        Some((id, label, metadata_json)) => Ok(Some(Node {
            id,
            label,
            metadata: parse_metadata(&metadata_json)?,
        })),
        None => Ok(None),
    }
}

pub(crate) fn read_edge(
    conn: &Connection,
    source: &str,
    target: &str,
    kind: RelationKind,
) -> Result<Option<Edge>> {
    conn.query_row(
        "SELECT source, target, kind, weight, updated_at FROM edges \
         WHERE source = ?1 AND target = ?2 AND kind = ?3",
        params![source, target, kind.as_str()],
        edge_from_row,
    )
    .optional()
    .map_err(BrainError::from)
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Edge, rusqlite::Error> {
    let kind_str: String = row.get(2)?;
    let kind = kind_str.parse::<RelationKind>().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown relation kind in store: {}", kind_str).into(),
        )
    })?;
    Ok(Edge {
        source: row.get(0)?,
        target: row.get(1)?,
        kind,
        weight: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn query_edges(conn: &Connection, sql: &str, id: &str) -> Result<Vec<Edge>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id], edge_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Insert-or-merge a node inside an open connection/transaction.
fn upsert_node_tx(
    conn: &Connection,
    id: &str,
    label: &str,
    metadata: BTreeMap<String, String>,
) -> Result<Node> {
    let now = Utc::now().to_rfc3339();
    let existing = read_node(conn, id)?;

    let node = match existing {
        Some(mut node) => {
            if !label.trim().is_empty() {
                node.label = label.to_string();
            }
            for (k, v) in metadata {
                node.metadata.insert(k, v);
            }
            let metadata_json = serde_json::to_string(&node.metadata)
                .map_err(|e| BrainError::Parse(e.to_string()))?;
            conn.execute(
                "UPDATE nodes SET label = ?2, metadata_json = ?3, updated_at = ?4 WHERE id = ?1",
                params![node.id, node.label, metadata_json, now],
            )?;
            node
        }
        None => {
            let label = if label.trim().is_empty() {
                DEFAULT_LABEL.to_string()
            } else {
                label.to_string()
            };
            let metadata_json = serde_json::to_string(&metadata)
                .map_err(|e| BrainError::Parse(e.to_string()))?;
            conn.execute(
                "INSERT INTO nodes (id, label, metadata_json, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![id, label, metadata_json, now],
            )?;
            Node {
                id: id.to_string(),
                label,
                metadata,
            }
        }
    };

    Ok(node)
}
