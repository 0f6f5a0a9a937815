//! TubeFocus CLI
//!
//! Synthesize block rules from a plain URL list, or reconcile a settings
//! snapshot against a rule-table file shaped like the browser's dynamic
//! rule table. Useful for inspecting exactly what the engine would
//! install before the extension does it for real.

use std::fs;

use clap::{Parser, Subcommand};

use tf_core::{build_block_rules, is_block_rule_id, BlockedWebsite, Rule};
use tf_engine::{MemoryHost, MemoryStore, SyncEngine};

#[derive(Parser)]
#[command(name = "tf-cli")]
#[command(about = "TubeFocus rule synthesis and reconciliation tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize block rules from a newline-separated URL list
    Rules {
        /// Input file, one website per line
        #[arg(short, long)]
        input: String,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Reconcile a settings snapshot against a rule-table file
    Sync {
        /// Settings store snapshot (JSON object)
        #[arg(short, long)]
        state: String,

        /// Rule table file (JSON array), updated in place
        #[arg(short, long)]
        rules: String,
    },

    /// Report band occupancy of a rule-table file
    Info {
        /// Rule table file (JSON array)
        #[arg(short, long)]
        rules: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Rules { input, pretty } => cmd_rules(&input, pretty),
        Commands::Sync { state, rules } => cmd_sync(&state, &rules).await,
        Commands::Info { rules } => cmd_info(&rules),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_rules(input: &str, pretty: bool) -> Result<(), String> {
    let content =
        fs::read_to_string(input).map_err(|e| format!("Failed to read '{input}': {e}"))?;

    let websites: Vec<BlockedWebsite> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| BlockedWebsite::new(line, 0))
        .collect();

    let rules = build_block_rules(&websites);
    let json = if pretty {
        serde_json::to_string_pretty(&rules)
    } else {
        serde_json::to_string(&rules)
    }
    .map_err(|e| format!("Failed to encode rules: {e}"))?;

    println!("{json}");
    eprintln!("{} entries -> {} rules", websites.len(), rules.len());
    Ok(())
}

async fn cmd_sync(state_path: &str, rules_path: &str) -> Result<(), String> {
    let store = MemoryStore::from_object(read_state(state_path)?);
    let host = MemoryHost::new();
    host.seed(read_rules(rules_path)?);

    let engine = SyncEngine::new(store, host);
    let outcome = engine
        .sync_now()
        .await
        .map_err(|e| format!("Reconcile failed: {e}"))?;

    let table = serde_json::to_string_pretty(&engine.host().rules_sorted())
        .map_err(|e| format!("Failed to encode rule table: {e}"))?;
    fs::write(rules_path, table).map_err(|e| format!("Failed to write '{rules_path}': {e}"))?;

    let state = serde_json::to_string_pretty(&serde_json::Value::Object(
        engine.store().to_object(),
    ))
    .map_err(|e| format!("Failed to encode state: {e}"))?;
    fs::write(state_path, state).map_err(|e| format!("Failed to write '{state_path}': {e}"))?;

    println!(
        "blocking {}: removed {}, installed {} ({})",
        if outcome.enabled { "enabled" } else { "disabled" },
        outcome.removed,
        outcome.installed,
        if outcome.verified {
            "verified"
        } else {
            "verification mismatch"
        }
    );
    Ok(())
}

fn cmd_info(rules_path: &str) -> Result<(), String> {
    let rules = read_rules(rules_path)?;
    let builtin = rules.iter().filter(|r| !is_block_rule_id(r.id)).count();
    let block = rules.len() - builtin;

    println!("{} rules total", rules.len());
    println!("  built-in band: {builtin}");
    println!("  block band:    {block}");

    for rule in &rules {
        let condition = rule
            .condition
            .regex_filter
            .as_deref()
            .or(rule.condition.url_filter.as_deref())
            .unwrap_or("<none>");
        println!(
            "  #{:<5} priority {} types {:<2} {}",
            rule.id,
            rule.priority,
            rule.condition.resource_types.len(),
            condition
        );
    }
    Ok(())
}

fn read_state(path: &str) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?;
    match serde_json::from_str(&content) {
        Ok(serde_json::Value::Object(object)) => Ok(object),
        Ok(_) => Err(format!("'{path}' must contain a JSON object")),
        Err(e) => Err(format!("Failed to parse '{path}': {e}")),
    }
}

fn read_rules(path: &str) -> Result<Vec<Rule>, String> {
    match fs::read_to_string(path) {
        Ok(content) => {
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse '{path}': {e}"))
        }
        // A missing table file means an empty table.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(format!("Failed to read '{path}': {e}")),
    }
}
