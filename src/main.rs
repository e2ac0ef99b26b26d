//! Config Consolidator CLI
//!
//! Entry point for the `consolidate` command-line tool.

use clap::{Args, Parser, Subcommand};
use config_consolidator::{ConfigConsolidator, Consolidation, EffectiveSettings, Settings};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "consolidate")]
#[command(about = "Merge configuration fragments and allocate them to output layers", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration
    Merge {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the consolidated layer allocations
    Layers {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the members allocated to one layer
    Emit {
        /// Layer name (e.g. sass, js, template)
        layer: String,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Fragment locations, lowest precedence first
    fragments: Vec<String>,

    /// Directory fragment locations are resolved against
    #[arg(long, short = 'b')]
    base_dir: Option<PathBuf>,

    /// Path to settings file (default: ./consolidate.toml if present)
    #[arg(long, short = 's')]
    settings: Option<PathBuf>,

    /// Leave `!expression` markers unresolved
    #[arg(long)]
    no_deferred: bool,

    /// Single-line JSON output
    #[arg(long)]
    compact: bool,
}

impl RunArgs {
    fn overrides(&self) -> serde_json::Value {
        let mut overrides = serde_json::json!({ "fragments": self.fragments });
        if let Some(ref dir) = self.base_dir {
            overrides["base_dir"] = serde_json::Value::String(dir.to_string_lossy().into_owned());
        }
        if self.no_deferred {
            overrides["resolve_deferred"] = serde_json::json!(false);
        }
        if self.compact {
            overrides["pretty"] = serde_json::json!(false);
        }
        overrides
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Merge { run } => {
            let (settings, consolidation) = consolidate(&run).await;
            print_json(&consolidation.config, settings.pretty);
        }
        Commands::Layers { run } => {
            let (settings, consolidation) = consolidate(&run).await;
            let layers: serde_json::Map<String, serde_json::Value> = consolidation
                .layers
                .iter()
                .filter(|(layer, _)| settings.emits_layer(layer))
                .map(|(layer, members)| (layer.to_string(), serde_json::json!(members)))
                .collect();
            print_json(&layers, settings.pretty);
        }
        Commands::Emit { layer, run } => {
            let (settings, consolidation) = consolidate(&run).await;
            if consolidation.layers.get(&layer).is_none() {
                eprintln!("Unknown layer '{}'", layer);
                eprintln!(
                    "Available layers: {}",
                    consolidation.layers.layers().collect::<Vec<_>>().join(", ")
                );
                process::exit(1);
            }
            print_json(&consolidation.layer(&layer), settings.pretty);
        }
    }
}

/// Logs go to stderr; stdout carries only the JSON result.
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn consolidate(run: &RunArgs) -> (Settings, Consolidation) {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let settings_path = EffectiveSettings::discover(run.settings.clone(), &cwd);

    let settings = match EffectiveSettings::build(settings_path.as_deref(), Some(run.overrides())) {
        Ok(effective) => effective.settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = settings.require_fragments() {
        eprintln!("{}", e);
        process::exit(1);
    }

    let consolidator = ConfigConsolidator::new();
    let result = consolidator
        .consolidate(
            settings.fragments.as_slice(),
            settings.base_dir.as_deref(),
            settings.resolve_deferred,
        )
        .await;

    match result {
        Ok(consolidation) => (settings, consolidation),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}
