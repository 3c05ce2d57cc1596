//! DeFi Risk Agent CLI
//!
//! Direct analysis of a token address, an interactive REPL, and the A2A server.

use clap::{Parser, Subcommand};
use defi_risk_agent::{repl, server, Chain, Config, Result, RiskAgent};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "defi-risk-agent")]
#[command(about = "AI-powered rug-pull risk assessment for DeFi tokens")]
#[command(version, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Token address to analyze directly
    address: Option<String>,

    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Chain for EVM addresses (ethereum, base, bsc)
    #[arg(long, global = true)]
    chain: Option<Chain>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full risk analysis for a token
    Analyze { address: String },

    /// Quick market overview without the model
    Quick { address: String },

    /// Holder distribution analysis
    Holders { address: String },

    /// Trending tokens on Solana
    Trending,

    /// Interactive session (default)
    Chat,

    /// Run the A2A JSON-RPC server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to bind
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show current configuration with keys redacted
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let serving = matches!(cli.command, Some(Commands::Serve { .. }));
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(if serving { "info" } else { "warn" }))
    };

    // Logs go to stderr so stdout carries only reports
    let layer = fmt::layer().with_writer(std::io::stderr);
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .init();
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    let command = match (cli.command, cli.address) {
        (Some(command), _) => command,
        (None, Some(address)) => Commands::Analyze { address },
        (None, None) => Commands::Chat,
    };

    if let Commands::Config = command {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    if let Commands::Serve { host, port } = &command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
    }

    let mut agent = RiskAgent::new(config).with_default_chain(cli.chain);
    agent.initialize().await?;

    let result = match command {
        Commands::Analyze { address } => {
            let report = agent.analyze(&address).await;
            report.map(|r| println!("{}", r.render_markdown()))
        }
        Commands::Quick { address } => {
            let report = agent.quick(&address).await;
            report.map(|r| println!("{}", r.render_markdown()))
        }
        Commands::Holders { address } => agent.holders(&address).await.map(|t| println!("{}", t)),
        Commands::Trending => agent.trending().await.map(|t| println!("{}", t)),
        Commands::Chat => repl::run(&agent).await,
        Commands::Serve { .. } => return serve(agent).await,
        Commands::Config => Ok(()),
    };

    agent.close().await;
    result
}

async fn serve(agent: RiskAgent) -> Result<()> {
    let host = agent.config().server.host.clone();
    let port = agent.config().server.port;
    let agent = Arc::new(agent);

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
        }
    };
    server::serve(agent.clone(), &host, port, shutdown).await?;

    if let Ok(mut agent) = Arc::try_unwrap(agent) {
        agent.close().await;
    }
    Ok(())
}
