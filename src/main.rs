use braingraph::db::{migrate, Db};
use braingraph::feedback::{listener, updater::LinkUpdater};
use braingraph::graph::seed;
use braingraph::server::HttpServer;
use braingraph::{watch, Config, GraphStore};
use std::path::Path;
use std::sync::Arc;
use anyhow::Result;

/// Open the database, run migrations, and import the seed document if one
/// is configured. Extracted to avoid duplicating this setup between the
/// serve and listen paths.
async fn build_store(config: &Config) -> Result<Arc<GraphStore>> {
    let db = Db::new(config.db_path());

    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| {
        migrate::run_migrations(conn, migrations_dir)
    }).await?;

    let store = Arc::new(GraphStore::new(
        db,
        config.feedback.weight_cap,
        config.graph.node_cache_capacity,
    ));

    if let Some(seed_path) = config.seed_path() {
        let doc = seed::load_or_default(seed_path)?;
        let (nodes, edges) = store.import_document(doc, false).await?;
        log::info!(
            "Seed document {} imported: {} nodes, {} edges",
            seed_path.display(),
            nodes,
            edges
        );
    }

    Ok(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger from environment variable or default to info level.
    // The listener uses stdout as its transport, so logs go to stderr.
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    // Parse command-line arguments
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => {
            // HTTP server mode (orchestrator transport)
            run_http_server().await?;
        }
        "listen" => {
            // Feedback listener mode (stdio transport)
            run_listener().await?;
        }
        "verify" | _ => {
            // Default: verify database schema
            run_schema_verification().await?;
        }
    }

    Ok(())
}

/// Run the HTTP server, with the seed watcher alongside when enabled
async fn run_http_server() -> Result<()> {
    log::info!("Starting BrainGraph HTTP Server v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let store = build_store(&config).await?;
    let updater = Arc::new(LinkUpdater::new(Arc::clone(&store), &config.feedback));

    if config.watch.enabled {
        if let Some(seed_path) = config.seed_path() {
            let watch_store = Arc::clone(&store);
            let path = seed_path.to_path_buf();
            let debounce = config.watch.debounce_ms;
            tokio::spawn(async move {
                if let Err(e) = watch::watch_seed(watch_store, path, debounce).await {
                    log::error!("Seed watcher exited: {}", e);
                }
            });
        } else {
            log::warn!("watch.enabled is set but graph.seed_path is not; nothing to watch");
        }
    }

    let http_server = HttpServer::new(store, updater, &config)?;
    http_server.run(config.http_server.port).await?;

    Ok(())
}

/// Run the stdio feedback listener
async fn run_listener() -> Result<()> {
    let config = Config::load()?;
    let store = build_store(&config).await?;
    let updater = Arc::new(LinkUpdater::new(store, &config.feedback));

    listener::run(updater).await?;

    Ok(())
}

/// Run database schema verification
async fn run_schema_verification() -> Result<()> {
    log::info!("Starting BrainGraph v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    log::info!("Configuration loaded successfully");
    log::info!("Database path: {}", config.db_path().display());
    if let Some(seed) = config.seed_path() {
        log::info!("Seed document: {}", seed.display());
    }

    let db = Db::new(config.db_path());

    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| {
        migrate::run_migrations(conn, migrations_dir)
    }).await?;

    log::info!("Database initialized successfully");

    verify_database_schema(&db).await?;

    Ok(())
}

/// Verify that all expected database objects exist
async fn verify_database_schema(db: &Db) -> Result<()> {
    use braingraph::db::migrate;
    use braingraph::error::BrainError;

    db.with_connection(|conn| {
        // Check tables
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let expected_tables = vec!["edges", "feedback_events", "graph_meta", "nodes", "schema_migrations"];
        let mut all_tables_exist = true;

        for table in &expected_tables {
            if !tables.iter().any(|t| t == table) {
                log::error!("Missing table: {}", table);
                all_tables_exist = false;
            } else {
                log::debug!("✓ Table exists: {}", table);
            }
        }

        if !all_tables_exist {
            return Err(BrainError::Config("Not all required tables exist".to_string()));
        }

        // Check migrations
        let applied = migrate::get_applied_migrations(conn)?;
        if applied.len() < 3 {
            return Err(BrainError::Config(format!("Expected at least 3 migrations, found {}", applied.len())));
        }
        log::debug!("✓ {} migrations applied", applied.len());

        // Check indexes
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name")?;
        let indexes: Vec<String> = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        for index_name in &["idx_edges_target", "idx_events_received_at"] {
            if indexes.iter().any(|i| i == index_name) {
                log::debug!("✓ Index exists: {}", index_name);
            } else {
                log::warn!("Index not found: {} (migration 002 may not be applied)", index_name);
            }
        }

        // Check pragmas
        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(BrainError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }
        log::debug!("✓ Journal mode: WAL");

        let foreign_keys: i32 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if foreign_keys != 1 {
            return Err(BrainError::Config("Foreign keys not enabled".to_string()));
        }
        log::debug!("✓ Foreign keys enabled");

        // Integrity check
        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(BrainError::Config(format!("Database integrity check failed: {}", integrity)));
        }
        log::info!("✓ Database integrity: OK");

        Ok(())
    }).await?;

    log::info!("✓ Database schema verification complete");
    Ok(())
}
