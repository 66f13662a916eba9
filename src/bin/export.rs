use clap::Parser;
use braingraph::db::{migrate, Db};
use braingraph::graph::{export, seed};
use braingraph::{Config, GraphStore};
use std::path::{Path, PathBuf};
use anyhow::Result;

#[derive(Parser, Debug)]
#[command(name = "export")]
#[command(about = "Export the BrainGraph store as a JSON document or Graphviz DOT")]
struct Args {
    /// Output format: json or dot
    #[arg(short = 'F', long, default_value = "json")]
    format: String,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
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

    let doc = store.export_snapshot().await?;

    match args.format.as_str() {
        "json" => {
            match &args.output {
                Some(path) => {
                    seed::write_document(path, &doc)?;
                    log::info!("Snapshot written to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&doc)?),
            }
        }
        "dot" => {
            let dot = export::to_dot(&doc);
            match &args.output {
                Some(path) => {
                    std::fs::write(path, dot)?;
                    log::info!("DOT graph written to {}", path.display());
                }
                None => println!("{}", dot),
            }
        }
        other => {
            anyhow::bail!("Unknown format '{}'. Use 'json' or 'dot'.", other);
        }
    }

    log::info!(
        "Exported {} nodes and {} edges",
        doc.nodes.len(),
        doc.edges.len()
    );

    Ok(())
}
