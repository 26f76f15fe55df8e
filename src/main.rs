use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tally::adapters::PostgresStore;
use tally::config::{AppConfig, LoggingConfig};
use tally::coordination::{wait_for_signal, ShutdownController};
use tally::error::Result;
use tally::services::{HealthServer, SettlementScheduler, SettlementService, SportsDataService};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tally")]
#[command(version = "0.1.0")]
#[command(about = "Sports results ingestion and pick settlement pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config directory path
    #[arg(short, long, default_value = "config")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion and settlement pipeline
    Run,
    /// Fetch live scores for a league and print them
    Scores {
        /// League key (nfl, nba, mlb, nhl)
        league: String,
        /// Bypass the response cache
        #[arg(long)]
        fresh: bool,
    },
    /// Fetch the upcoming schedule for a league and print it
    Schedule {
        /// League key (nfl, nba, mlb, nhl)
        league: String,
        /// Days ahead to cover
        #[arg(long, default_value = "7")]
        days: i64,
    },
    /// Show provider and circuit breaker health
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The [logging] section drives subscriber setup, so config loads first.
    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    match &cli.command {
        Some(Commands::Scores { league, fresh }) => {
            init_logging_simple();
            show_scores(&config, league, *fresh).await?;
        }
        Some(Commands::Schedule { league, days }) => {
            init_logging_simple();
            show_schedule(&config, league, *days).await?;
        }
        Some(Commands::Providers) => {
            init_logging_simple();
            show_providers(&config).await?;
        }
        Some(Commands::Run) | None => {
            init_logging(&config.logging);
            run_pipeline(config).await?;
        }
    }

    Ok(())
}

/// Long-running mode: scheduler loops plus the health server.
async fn run_pipeline(config: AppConfig) -> Result<()> {
    info!("Starting tally settlement pipeline");
    info!(
        "Configuration: providers={:?}, score refresh={}s",
        config.providers.priority, config.scheduler.score_refresh_secs
    );

    let store = PostgresStore::new(&config.database.url, config.database.max_connections).await?;
    store.migrate().await?;

    let sports = Arc::new(SportsDataService::from_config(&config)?);
    let settlement = Arc::new(SettlementService::new(store, Arc::clone(&sports)));

    let controller = ShutdownController::new();
    let scheduler = SettlementScheduler::new(Arc::clone(&settlement), config.scheduler.clone());
    let tasks = scheduler.start(&controller.token());

    let health_handle = config.health_port.map(|port| {
        let server = HealthServer::new(Arc::clone(&sports), port);
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Health server error: {}", e);
            }
        })
    });

    info!("Pipeline is running. Press Ctrl+C to stop.");
    wait_for_signal().await;

    info!("Shutting down...");
    controller.request_shutdown();
    scheduler.join(tasks).await;

    if let Some(handle) = health_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

/// One-shot: current live scores for a league.
async fn show_scores(config: &AppConfig, league: &str, fresh: bool) -> Result<()> {
    let sports = SportsDataService::from_config(config)?;

    // Provider league tables are keyed by the canonical uppercase name.
    let league = league.to_uppercase();
    println!("Fetching live scores for {}...\n", league);

    let results = sports.get_live_results(&league, !fresh).await?;

    if results.is_empty() {
        println!("  No games in progress.");
        return Ok(());
    }

    for result in &results {
        let score = match (result.home_score, result.away_score) {
            (Some(home), Some(away)) => format!("{} - {}", home, away),
            _ => "-".to_string(),
        };
        println!(
            "  [{}] {} vs {}  {}",
            result.status, result.home_team, result.away_team, score
        );
    }
    println!(
        "\n  {} games via {}.",
        results.len(),
        results[0].provider
    );

    Ok(())
}

/// One-shot: upcoming schedule for a league.
async fn show_schedule(config: &AppConfig, league: &str, days: i64) -> Result<()> {
    let sports = SportsDataService::from_config(config)?;

    let league = league.to_uppercase();
    let start = Utc::now();
    let end = start + chrono::Duration::days(days.max(1));

    println!("Fetching {} schedule for the next {} days...\n", league, days.max(1));

    let games = sports.get_schedule(&league, start, end, true).await?;

    if games.is_empty() {
        println!("  No games scheduled.");
        return Ok(());
    }

    for game in &games {
        let when = game.scheduled_start_time.format("%Y-%m-%d %H:%M UTC");
        match &game.venue {
            Some(venue) => {
                println!("  {}  {} at {} ({})", when, game.away_team, game.home_team, venue)
            }
            None => println!("  {}  {} at {}", when, game.away_team, game.home_team),
        }
    }
    println!("\n  {} games found.", games.len());

    Ok(())
}

/// One-shot: provider priority, breaker states and cache status.
async fn show_providers(config: &AppConfig) -> Result<()> {
    let sports = SportsDataService::from_config(config)?;
    let health = sports.health().await;

    println!("Configured providers (failover order):\n");
    for name in &health.configured_providers {
        println!("  {}", name);
    }

    println!(
        "\nCache: {} ({} entries)",
        health.cache_status, health.cache_entries
    );

    if health.breakers.is_empty() {
        println!("\nNo circuit breaker activity recorded yet.");
    } else {
        println!("\nCircuit breakers:");
        for breaker in &health.breakers {
            println!(
                "  {}: {} ({}/{} failures)",
                breaker.name, breaker.state, breaker.failure_count, breaker.failure_threshold
            );
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tally=debug,sqlx=warn", logging.level))
    });

    // Check if we should write to file (prefer TALLY_LOG_DIR, fallback to LOG_DIR).
    let log_dir = std::env::var("TALLY_LOG_DIR")
        .or_else(|_| std::env::var("LOG_DIR"))
        .unwrap_or_else(|_| "/var/log/tally".to_string());

    // Try to create log directory.
    //
    // Important: `tracing_appender::rolling::daily` will panic (and in our release build,
    // abort) if it can't create the initial log file. So we must preflight writability.
    let file_layer = if std::fs::create_dir_all(&log_dir).is_ok() {
        let test_path = std::path::Path::new(&log_dir).join(".tally_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                // Daily rotating file appender
                let file_appender = tracing_appender::rolling::daily(&log_dir, "tally.log");
                let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

                // Keep the guard alive by leaking it (acceptable for long-running process)
                Box::leak(Box::new(_guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false) // No color codes in file
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    } else {
        eprintln!(
            "Warning: Could not create log directory {}, file logging disabled",
            log_dir
        );
        None
    };

    // Console layer
    let console_layer = if logging.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if file_logging_enabled {
        eprintln!("Logging to: {}/tally.log", log_dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
