pub mod config;
pub mod discovery;
pub mod fuse;
pub mod ignore_rules;
pub mod load_config;
pub mod plugin;
pub mod run;
pub mod storage;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use load_config::load_config;
use plugin::PluginRegistry;
use run::run_fusion;
use storage::LocalStorage;

#[derive(Parser)]
#[clap(
    name = "repofuse",
    version,
    about = "Fuse project source files into a single deterministic artifact for LLM ingestion"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one discovery-to-artifact fusion pass using the given config file
    Fuse {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,

        /// Print the run report as JSON instead of the human summary
        #[clap(long)]
        json: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Fuse { config, json } => {
            let config = load_config(config)?;
            let registry = PluginRegistry::new();
            let storage = LocalStorage::new();

            let report = run_fusion(&config, &registry, &storage).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.success {
                println!("Fusion complete. {}", report.message);
                if let Some(log_path) = &report.log_path {
                    println!("Log: {}", log_path.display());
                }
            } else {
                eprintln!("[ERROR] Fusion failed: {}", report.message);
                if let Some(detail) = &report.error {
                    eprintln!("        {detail}");
                }
            }

            if report.success {
                Ok(())
            } else {
                Err(anyhow::Error::msg(report.message))
            }
        }
    }
}
