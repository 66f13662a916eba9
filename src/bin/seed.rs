use clap::Parser;
use braingraph::db::{migrate, Db};
use braingraph::graph::seed;
use braingraph::{Config, GraphStore};
use std::path::{Path, PathBuf};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Import a graph seed document into the BrainGraph store")]
struct Args {
    /// Seed document to import (defaults to graph.seed_path from config)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Drop the existing graph before importing
    #[arg(short, long)]
    replace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "info")
    ).init();

    let args = Args::parse();

    // Load configuration
    let config = Config::load()?;

    let seed_path = match args.file.or_else(|| config.seed_path().map(Path::to_path_buf)) {
        Some(p) => p,
        None => {
            anyhow::bail!(
                "No seed document given. Pass --file or set graph.seed_path in config.toml."
            );
        }
    };

    log::info!("Importing seed document {}", seed_path.display());

    // Initialize database
    let db = Db::new(config.db_path());

    // Run migrations
    let migrations_dir = Path::new("migrations");
    db.with_connection(|conn| {
        migrate::run_migrations(conn, migrations_dir)
    }).await?;

    let store = GraphStore::new(
        db,
        config.feedback.weight_cap,
        config.graph.node_cache_capacity,
    );

    let doc = seed::load_document(&seed_path)?;
    if args.replace {
        log::warn!("--replace given: dropping the existing graph first");
    }
    let (nodes, edges) = store.import_document(doc, args.replace).await?;

    let (total_nodes, total_edges) = store.counts().await?;
    println!("Imported {} nodes and {} edges from {}", nodes, edges, seed_path.display());
    println!("Store now holds {} nodes and {} edges", total_nodes, total_edges);

    Ok(())
}
