// Colored terminal output for verdicts and model status.
//
// This module handles all terminal-specific formatting: colors and tables.
// The main.rs display paths delegate here.

use colored::Colorize;

use crate::db::models::Verdict;
use crate::output::truncate_chars;
use crate::registry::{ModelDescriptor, ModelStatus};

/// Display a single verdict in the terminal.
pub fn display_verdict(target: &str, verdict: &Verdict) {
    println!(
        "\n{}",
        format!("=== Verdict for {} ===", truncate_chars(target, 60)).bold()
    );

    if verdict.is_malicious {
        println!("  Result: {}", "MALICIOUS".red().bold());
    } else {
        println!("  Result: {}", "not malicious".green());
    }
    println!("  Confidence: {:.2}", verdict.confidence);

    if !verdict.threat_types.is_empty() {
        println!("  Threat types: {}", verdict.threat_types.join(", "));
    }

    println!("  Source: {}", verdict.source);
    println!(
        "  Analyzed at: {}",
        verdict.analyzed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    if let Some(version) = verdict
        .metadata
        .get("model_version")
        .and_then(|v| v.as_str())
    {
        println!("  Model version: {}", version.dimmed());
    }
}

/// Display the model registry state as a table.
pub fn display_models(models: &[ModelDescriptor]) {
    if models.is_empty() {
        println!("No models configured. Set BASALT_MODELS in your .env file.");
        return;
    }

    println!("\n{}", format!("=== Models ({}) ===", models.len()).bold());
    println!();
    println!(
        "  {:<24} {:<12} {:<10} {:>9}",
        "Name".dimmed(),
        "Version".dimmed(),
        "Status".dimmed(),
        "Accuracy".dimmed(),
    );
    println!("  {}", "-".repeat(58).dimmed());

    for model in models {
        let version = if model.version.is_empty() {
            "-"
        } else {
            &model.version
        };
        let accuracy = model
            .metrics
            .map(|m| format!("{:.3}", m.accuracy))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "  {:<24} {:<12} {:<10} {:>9}",
            model.name,
            version,
            colorize_status(model.status),
            accuracy,
        );

        if let Some(error) = &model.last_error {
            println!("      {}", truncate_chars(error, 70).red().dimmed());
        }
    }
}

fn colorize_status(status: ModelStatus) -> colored::ColoredString {
    match status {
        ModelStatus::Ready => status.as_str().green(),
        ModelStatus::Loading => status.as_str().yellow(),
        ModelStatus::Error => status.as_str().red(),
    }
}
