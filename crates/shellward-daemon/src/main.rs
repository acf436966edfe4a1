//! `shellwardd` — the Shellward session daemon binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shellward_daemon::Daemon;
use shellward_guard::RuleSet;
use shellward_pipeline::{ChatClient, Disabled, Fixer, Pipeline, PipelineConfig, Translator};
use shellward_types::DaemonConfig;

#[derive(Debug, Parser)]
#[command(name = "shellwardd", about = "Shellward session daemon", version)]
struct Cli {
    /// Path of the unix socket to listen on.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// TOML configuration file; CLI flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interaction records retained per session.
    #[arg(long)]
    history_capacity: Option<usize>,

    /// Maximum replan rounds before the user is told to intervene.
    #[arg(long)]
    replan_bound: Option<u32>,

    /// Seconds allowed per translator/fixer call.
    #[arg(long)]
    collaborator_timeout: Option<u64>,

    /// Increase log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                DaemonConfig::from_toml(&content)?
            }
            None => DaemonConfig::default(),
        };
        if let Some(socket) = self.socket {
            config.socket_path = socket;
        }
        if let Some(capacity) = self.history_capacity {
            config.history_capacity = capacity;
        }
        if let Some(bound) = self.replan_bound {
            config.replan_bound = bound;
        }
        if let Some(timeout) = self.collaborator_timeout {
            config.collaborator_timeout_secs = timeout;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Build the translator/fixer pair from the environment. Without an API
/// key both collaborators are disabled stubs whose calls surface as
/// "not configured" messages.
fn collaborators() -> (Arc<dyn Translator>, Arc<dyn Fixer>) {
    match ChatClient::from_env() {
        Some(client) => {
            info!(model = client.model(), "collaborators configured");
            let client = Arc::new(client);
            (client.clone(), client)
        }
        None => {
            warn!("SHELLWARD_API_KEY not set; translation and fixing are disabled");
            (Arc::new(Disabled), Arc::new(Disabled))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.into_config()?;

    // A malformed rule table is fatal here, never a per-request failure.
    let rules = RuleSet::builtin().context("compiling danger rules")?;
    let (translator, fixer) = collaborators();
    let pipeline = Pipeline::new(rules, translator, fixer, PipelineConfig::from(&config));
    let daemon = Arc::new(Daemon::new(config, pipeline));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received ctrl-c");
            let _ = shutdown_tx.send(true);
        }
    });

    daemon.run(shutdown_rx).await?;
    Ok(())
}
