//! athena - cognitive orchestration for a BDI agent
//!
//! Usage:
//!   athena                              → run with ./athena.toml (or defaults)
//!   athena --config bob.toml --name bob → custom config and agent name
//!   athena --offline                    → scripted inference, no server needed
//!   athena --dump-config                → print the default config

use anyhow::Context;
use athena::driver;
use athena_cognition::{Athena, AthenaConfig};
use athena_core::{AgentMind, InMemoryMind};
use athena_llm::{InferenceService, ScriptedProvider};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "athena",
    about = "Cognitive orchestration layer for BDI agents",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Path to the config file (TOML)
    #[arg(short, long, default_value = "athena.toml")]
    config: PathBuf,

    /// Agent name (overrides agent.name)
    #[arg(short, long)]
    name: Option<String>,

    /// Model to think with (overrides inference.model)
    #[arg(short, long)]
    model: Option<String>,

    /// Persona text or file (overrides agent.persona)
    #[arg(short, long)]
    persona: Option<String>,

    /// Plan library to load (overrides agent.behavior)
    #[arg(short, long)]
    behavior: Option<PathBuf>,

    /// Use a scripted provider that answers with nothing
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Print the default config and exit
    #[arg(long, default_value_t = false)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.dump_config {
        print!("{}", AthenaConfig::default().to_toml());
        return Ok(());
    }

    let _guard = init_tracing(cli.log_json, cli.log_dir.as_deref());

    let mut config = AthenaConfig::load(&cli.config).with_env_overrides();
    if let Some(name) = &cli.name {
        config.agent.name = name.clone();
    }
    if let Some(model) = &cli.model {
        config.inference.model = model.clone();
    }
    if let Some(persona) = &cli.persona {
        config.agent.persona = Some(persona.clone());
    }
    if let Some(behavior) = &cli.behavior {
        config.agent.behavior = Some(behavior.clone());
    }
    config.validate().context("invalid configuration")?;

    run(config, cli.offline).await
}

fn init_tracing(json: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "athena=info".into());
    let (plain, structured) = if json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
    } else {
        (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None)
    };
    let (file, guard) = match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "athena.log"));
            (
                Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain)
        .with(structured)
        .with(file)
        .init();
    guard
}

async fn run(config: AthenaConfig, offline: bool) -> anyhow::Result<()> {
    let mut mind = InMemoryMind::new(&config.agent.name);
    if let Some(path) = &config.agent.behavior {
        let plans = driver::load_behavior(path)
            .with_context(|| format!("failed to load plans from {}", path.display()))?;
        tracing::info!("Loaded {} plans from {}", plans.len(), path.display());
        for plan in plans {
            mind = mind.with_plan(plan);
        }
        mind = mind.with_source(path);
    }
    let mind: Arc<dyn AgentMind> = Arc::new(mind);

    let service: Arc<dyn InferenceService> = if offline {
        tracing::info!("Offline mode: scripted inference");
        Arc::new(ScriptedProvider::text("").without_session_check())
    } else {
        tracing::info!(
            "Inference: {} (model {})",
            config.inference.url,
            config.inference.model
        );
        Arc::new(config.provider())
    };

    let athena = Athena::from_config(mind, service, &config);
    if let Some(persona) = &config.agent.persona {
        athena.set_persona(persona)?;
    }
    if config.nap.enabled {
        athena.configure_nap(
            config.nap.keep_count,
            config.nap.ram_threshold_fraction * 100.0,
        )?;
    }
    if config.collector.enabled {
        athena.configure_collector(config.collector.keep_count, config.collector.period_minutes)?;
    }

    if let Err(e) = athena.start_thinking(Some(&config.inference.model)).await {
        tracing::warn!("Continuing without a cognitive session: {}", e);
    } else if config.monitor.enabled {
        athena.configure_monitor(config.monitor_settings())?;
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = driver::run(athena.clone(), stdin, config.agent.known_agents.clone()) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    athena.shutdown().await;
    Ok(())
}
