use braingraph::{config::Config, db::Db, error::BrainError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let db = Db::new(config.db_path());

    println!("\n=== BrainGraph Store Statistics ===\n");

    // Node counts by label
    let node_stats = db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT label, COUNT(*) as count
            FROM nodes
            GROUP BY label
            ORDER BY count DESC, label
            "#
        )?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();

        while let Some(row) = rows.next()? {
            results.push((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
            ));
        }

        Ok::<Vec<_>, BrainError>(results)
    }).await?;

    if node_stats.is_empty() {
        println!("The graph is empty.");
        println!("\nImport a seed document or send feedback events to populate it.");
        return Ok(());
    }

    println!("Nodes by Label:\n");
    println!("{:-<40}", "");
    println!("{:<25} {:>10}", "Label", "Count");
    println!("{:-<40}", "");
    for (label, count) in &node_stats {
        println!("{:<25} {:>10}", label, count);
    }
    println!("{:-<40}", "");

    // Edge statistics by relation kind
    let edge_stats = db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT
                kind,
                COUNT(*) as count,
                AVG(weight) as avg_weight,
                MIN(weight) as min_weight,
                MAX(weight) as max_weight
            FROM edges
            GROUP BY kind
            ORDER BY count DESC
            "#
        )?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();

        while let Some(row) = rows.next()? {
            results.push((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ));
        }

        Ok::<Vec<_>, BrainError>(results)
    }).await?;

    if !edge_stats.is_empty() {
        println!("\nEdges by Relation Kind:\n");
        println!("{:-<65}", "");
        println!(
            "{:<15} {:>8} {:>12} {:>12} {:>12}",
            "Kind", "Count", "Avg Weight", "Min Weight", "Max Weight"
        );
        println!("{:-<65}", "");
        for (kind, count, avg, min, max) in &edge_stats {
            println!(
                "{:<15} {:>8} {:>12.3} {:>12.3} {:>12.3}",
                kind,
                count,
                avg.unwrap_or(0.0),
                min.unwrap_or(0.0),
                max.unwrap_or(0.0)
            );
        }
        println!("{:-<65}", "");
    }

    // Strongest edges
    let top_edges = db.with_connection(|conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT source, target, kind, weight
            FROM edges
            ORDER BY weight DESC, source, target
            LIMIT 10
            "#
        )?;

        let mut rows = stmt.query([])?;
        let mut results = Vec::new();

        while let Some(row) = rows.next()? {
            results.push((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ));
        }

        Ok::<Vec<_>, BrainError>(results)
    }).await?;

    if !top_edges.is_empty() {
        println!("\nStrongest Edges:\n");
        for (source, target, kind, weight) in &top_edges {
            println!("  {} --[{}]--> {}  ({:.3})", source, kind, target, weight);
        }
    }

    // Recent feedback activity
    let recent_count = db.with_connection(|conn| {
        conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM feedback_events
            WHERE received_at > datetime('now', '-24 hours')
            "#,
            [],
            |row| row.get::<_, i64>(0)
        ).map_err(BrainError::from)
    }).await?;

    println!("\nRecent Activity:");
    println!("  Feedback events in last 24 hours: {}", recent_count);

    // Total feedback statistics
    let total_stats = db.with_connection(|conn| {
        conn.query_row(
            r#"
            SELECT
                COUNT(*) as total_events,
                MIN(received_at) as first_event,
                MAX(received_at) as last_event
            FROM feedback_events
            "#,
            [],
            |row| Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        ).map_err(BrainError::from)
    }).await?;

    println!("\nTotal Statistics:");
    println!("  Total feedback events recorded: {}", total_stats.0);
    if let Some(first) = total_stats.1 {
        println!("  First event: {}", first);
    }
    if let Some(last) = total_stats.2 {
        println!("  Last event: {}", last);
    }

    println!();

    Ok(())
}
