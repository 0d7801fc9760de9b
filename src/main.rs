//! Keysieve - a transparent key-filtering replication proxy for Redis
//!
//! This is the main entry point for the proxy.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use keysieve::config::{Config, LogFormat};
use keysieve::server::Server;
use tracing::{error, info};

/// Keysieve - a transparent key-filtering replication proxy for Redis
///
/// Accepts replica connections, relays replication from the configured
/// master, and forwards only the keys whose names match the given regular
/// expression.
#[derive(Parser, Debug)]
#[command(name = "keysieve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Regular expression to match against the Redis keys
    #[arg(value_name = "PATTERN")]
    key_pattern: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Master Redis host
    #[arg(
        long = "master-host",
        value_name = "HOST",
        env = "KEYSIEVE_MASTER_HOST"
    )]
    master_host: Option<String>,

    /// Master Redis port
    #[arg(
        long = "master-port",
        value_name = "PORT",
        env = "KEYSIEVE_MASTER_PORT"
    )]
    master_port: Option<u16>,

    /// Proxy host for listening, default is all hosts
    #[arg(long = "proxy-host", value_name = "HOST", env = "KEYSIEVE_PROXY_HOST")]
    proxy_host: Option<String>,

    /// Proxy port for listening
    #[arg(long = "proxy-port", value_name = "PORT", env = "KEYSIEVE_PROXY_PORT")]
    proxy_port: Option<u16>,

    /// Log level: trace, debug, info, warn, error (overrides config file)
    #[arg(
        short = 'l',
        long = "log-level",
        value_name = "LEVEL",
        env = "KEYSIEVE_LOG_LEVEL"
    )]
    log_level: Option<String>,
}

impl Cli {
    /// Apply CLI argument overrides to the configuration
    fn apply_to_config(&self, config: &mut Config) {
        if let Some(ref pattern) = self.key_pattern {
            config.filter.key_pattern = pattern.clone();
        }
        if let Some(ref host) = self.master_host {
            config.master.host = host.clone();
        }
        if let Some(port) = self.master_port {
            config.master.port = port;
        }
        if let Some(ref host) = self.proxy_host {
            config.proxy.bind = host.clone();
        }
        if let Some(port) = self.proxy_port {
            config.proxy.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, keysieve::ProxyError> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let default_path = PathBuf::from("keysieve.toml");
            if default_path.exists() {
                Config::from_file(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    cli.apply_to_config(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}

fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");

    info!("Starting Keysieve v{}", version);
    info!("  Master: {}", config.master_addr());
    info!("  Listening: {}", config.proxy_addr());
    info!("  Key pattern: {}", config.filter.key_pattern);
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config);
    print_banner(&config);

    match Server::new(config).await {
        Ok(server) => match server.run().await {
            Ok(()) => {
                info!("Keysieve shut down gracefully");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Server error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("Failed to start proxy: {}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
