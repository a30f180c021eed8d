//! Knot CLI
//!
//! Key generation, configuration and in-process consensus simulation.

use clap::{Parser, Subcommand};
use knot_crypto::KeyPair;
use knot_node::{init_logging, run_simulation, LoggingConfig, NodeConfig, SimulationConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "knot")]
#[command(author = "Knot Contributors")]
#[command(version)]
#[command(about = "Knot - hashgraph consensus over a gossip DAG", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KNOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new keypair
    Keygen {
        /// Output directory for keys
        #[arg(short, long, default_value = "~/.knot/keys")]
        output: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,

    /// Run an in-process gossip network and check consensus agreement
    Simulate {
        /// Number of participants
        #[arg(short, long, default_value = "4")]
        nodes: usize,

        /// Number of syncs to perform
        #[arg(short, long, default_value = "200")]
        steps: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print the first node's Prometheus metrics after the report
        #[arg(long)]
        metrics: bool,
    },

    /// Version information
    Version,
}

fn expand_path(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NodeConfig> {
    let path = path.map(expand_path);
    Ok(NodeConfig::load(path.as_deref())?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let logging = match cli.command {
        // keep stdout clean for machine-readable output
        Commands::Simulate { json: true, .. } | Commands::Config => LoggingConfig {
            level: "warn".to_string(),
            ..config.logging.clone()
        },
        _ => config.logging.clone(),
    };
    init_logging(&logging, cli.verbose)?;

    match cli.command {
        Commands::Keygen { output } => {
            let output_dir = expand_path(&output);
            std::fs::create_dir_all(&output_dir)?;

            tracing::info!("Generating Ed25519 keypair...");
            let keypair = KeyPair::generate();
            let creator = keypair.creator_id();

            let secret_path = output_dir.join("node.key");
            let id_path = output_dir.join("node.id");
            std::fs::write(&secret_path, keypair.secret_hex().as_bytes())?;
            std::fs::write(&id_path, creator.to_hex())?;

            println!("Keypair generated successfully!");
            println!("Creator ID: {}", creator.to_hex());
            println!("Secret key: {:?}", secret_path);
            println!("Set node.secret_key or KNOT__NODE__SECRET_KEY to use it.");
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }

        Commands::Simulate {
            nodes,
            steps,
            json,
            metrics,
        } => {
            let report = run_simulation(SimulationConfig {
                nodes,
                steps,
                node: config,
            })
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Simulated {} nodes over {} syncs", report.nodes, report.steps);
                for node in &report.reports {
                    println!(
                        "  {:<8} {}  events={:<5} max_round={:<4} ordered={}",
                        node.name,
                        &node.creator[..16],
                        node.events,
                        node.max_round,
                        node.ordered
                    );
                }
                println!("Common prefix: {} events", report.common_prefix);
                println!(
                    "Consistent: {}",
                    if report.consistent { "yes" } else { "NO" }
                );
            }

            if metrics {
                match &report.metrics {
                    Some(text) => print!("{text}"),
                    None => tracing::warn!("metrics are disabled in the configuration"),
                }
            }

            if !report.consistent {
                anyhow::bail!("consensus logs diverged");
            }
        }

        Commands::Version => {
            println!("knot {}", env!("CARGO_PKG_VERSION"));
            println!("Consensus: hashgraph virtual voting");
            println!("Signatures: Ed25519");
            println!("Hashing: BLAKE3");
        }
    }

    Ok(())
}
