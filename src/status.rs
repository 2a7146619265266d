// System status display — DB stats, indicator cache freshness, audit size.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::db::Database;
use crate::feeds::LAST_REFRESH_STATE_KEY;

/// Display system status to the terminal.
pub async fn show(db: &Arc<dyn Database>, config: &Config) -> Result<()> {
    if !Path::new(&config.db_path).exists() {
        println!("Database: not initialized");
        println!("\nRun `basalt init` to set up the database.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&config.db_path)
        .map(|m| format_bytes(m.len()))
        .unwrap_or_else(|_| "unknown".to_string());
    println!("Database: {} ({})", config.db_path, file_size);

    let (total, active) = db.indicator_counts().await?;
    println!("Indicators: {} cached, {} active", total, active);

    match db.get_state(LAST_REFRESH_STATE_KEY).await? {
        Some(at) => println!("Last feed refresh: {}", at),
        None => {
            println!("Last feed refresh: never");
            if config.feed_urls.is_empty() {
                println!("  No feed sources configured (set BASALT_FEED_URLS)");
            } else {
                println!("  Run `basalt refresh` to pull the configured feeds");
            }
        }
    }

    let analyses = db.analysis_count().await?;
    println!("Analysis records: {}", analyses);

    println!(
        "Backend: {} ({} models configured)",
        config.backend_url,
        config.model_names.len()
    );

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
