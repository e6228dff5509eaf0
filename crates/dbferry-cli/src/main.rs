//! dbferry CLI - run statements and streaming transfers against named connections.

use clap::{Parser, Subcommand};
use dbferry::{Config, Executor, FerryError, Registry, ResultSet, TransferEngine, TransferRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "dbferry")]
#[command(about = "Streaming cross-database transfers with batched, transactional loads")]
#[command(version)]
struct Cli {
    /// Path to YAML connection registry
    #[arg(short, long, default_value = "dbferry.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a statement that returns no rows
    Exec {
        /// Registered connection name
        #[arg(long)]
        conn: String,

        /// SQL statement
        sql: String,
    },

    /// Run a query and print its rows
    Query {
        /// Registered connection name
        #[arg(long)]
        conn: String,

        /// Maximum rows to return
        #[arg(long, default_value = "100")]
        limit: usize,

        /// SQL query
        sql: String,
    },

    /// Stream a query's rows into a destination table
    Transfer {
        /// Path to YAML transfer job
        #[arg(long)]
        job: PathBuf,
    },

    /// List registered connections
    Connections,

    /// Test database connections
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), FerryError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(FerryError::Config)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    // Listing needs no pools.
    if let Commands::Connections = cli.command {
        return list_connections(&config, cli.output_json);
    }

    let cancel_token = setup_signal_handler();
    let registry = Arc::new(Registry::connect(&config)?);
    let executor = Executor::new(registry.clone());

    let outcome = run_command(&cli, &executor, &cancel_token).await;
    registry.close().await;
    outcome
}

async fn run_command(
    cli: &Cli,
    executor: &Executor,
    cancel_token: &CancellationToken,
) -> Result<(), FerryError> {
    match &cli.command {
        Commands::Connections => Ok(()),

        Commands::Exec { conn, sql } => {
            let result = executor.exec(cancel_token, conn, sql).await?;
            print_result(&result, cli.output_json)
        }

        Commands::Query { conn, limit, sql } => {
            let result = executor.query(cancel_token, conn, sql, *limit).await?;
            print_result(&result, cli.output_json)
        }

        Commands::Transfer { job } => {
            let request = TransferRequest::load(job)?;
            info!("Loaded transfer job from {:?}", job);

            let engine = TransferEngine::new(executor.clone());
            let result = engine.transfer(cancel_token, &request).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("\nTransfer completed!");
                println!(
                    "  {} -> {}.{}",
                    request.source.connection,
                    request.destination.connection,
                    request.destination.table
                );
                println!("  Duration: {:.2}s", result.duration().as_secs_f64());
                println!("  Rows: {}", result.rows_affected());
            }
            Ok(())
        }

        Commands::HealthCheck => {
            let results = executor.registry().health_check().await;
            let healthy = results.iter().all(|(_, r)| r.is_ok());

            if cli.output_json {
                let report: Vec<serde_json::Value> = results
                    .iter()
                    .map(|(name, r)| {
                        serde_json::json!({
                            "connection": name,
                            "connected": r.is_ok(),
                            "error": r.as_ref().err().map(|e| e.to_string()),
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "healthy": healthy,
                        "connections": report,
                    }))?
                );
            } else {
                println!("Health Check Results:");
                for (name, r) in &results {
                    match r {
                        Ok(()) => println!("  {}: OK", name),
                        Err(e) => {
                            println!("  {}: FAILED", name);
                            println!("    Error: {}", e);
                        }
                    }
                }
                println!(
                    "\n  Overall: {}",
                    if healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !healthy {
                return Err(FerryError::pool("Health check failed", "health-check"));
            }
            Ok(())
        }
    }
}

fn list_connections(config: &Config, output_json: bool) -> Result<(), FerryError> {
    if output_json {
        let list: Vec<serde_json::Value> = config
            .connections
            .iter()
            .map(|(name, c)| serde_json::json!({ "name": name, "db_type": c.db_type }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for (name, c) in &config.connections {
            println!("{}\t{}", name, c.db_type);
        }
    }
    Ok(())
}

fn print_result(result: &ResultSet, output_json: bool) -> Result<(), FerryError> {
    if output_json {
        println!("{}", result.to_json()?);
        return Ok(());
    }

    println!("{}", result.columns().join("\t"));
    for row in result.rows() {
        println!("{}", row.join("\t"));
    }
    println!(
        "\n({} rows, {} affected, {}ms)",
        result.rows().len(),
        result.rows_affected(),
        result.duration().as_millis()
    );
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("invalid verbosity '{}'", other)),
    };

    // Logs go to stderr so --output-json stays parseable.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("invalid log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();

    for (kind, label) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel_token.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Rolling back and shutting down...", label);
                    token.cancel();
                }
                Err(e) => eprintln!("Failed to install {} handler: {}", label, e),
            }
        });
    }

    cancel_token
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Rolling back and shutting down...");
                token.cancel();
            }
            Err(e) => eprintln!("Failed to install Ctrl-C handler: {}", e),
        }
    });

    cancel_token
}
