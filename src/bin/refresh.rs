// src/bin/refresh.rs
// DOCUMENTATION: One-shot refresh runner
// PURPOSE: Run a single discovery, live, weekly or known-venue refresh against the configured store
//
// Usage: crowd-sense-refresh [discovery|search|filter|live|cached|weekly|known|seeds]

use anyhow::{bail, Context, Result};
use crowd_sense::config::{self, Config, ProviderMode, StoreBackend};
use crowd_sense::db::{GeoCacheStore, InMemoryGeoStore, PgGeoStore, VenueCacheDao};
use crowd_sense::services::{
    describe_seeds, BestTimeClient, FixtureVenueDirectory, ForecastStats, RefreshStats,
    VenueDirectory, VenueRefresher,
};
use dotenv::dotenv;
use std::env;
use std::sync::Arc;
use std::time::Instant;

// --- ANSI colours ---
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Discovery,
    Search,
    Filter,
    Live,
    Cached,
    Weekly,
    Known,
    Seeds,
}

impl Command {
    fn parse(arg: Option<&str>) -> Result<Self> {
        Ok(match arg.unwrap_or("discovery") {
            "discovery" => Command::Discovery,
            "search" => Command::Search,
            "filter" => Command::Filter,
            "live" => Command::Live,
            "cached" => Command::Cached,
            "weekly" => Command::Weekly,
            "known" => Command::Known,
            "seeds" => Command::Seeds,
            other => bail!(
                "unknown command {:?} (expected discovery, search, filter, live, cached, weekly, known or seeds)",
                other
            ),
        })
    }
}

async fn build_store(config: &Config) -> Result<Arc<dyn GeoCacheStore>> {
    let store: Arc<dyn GeoCacheStore> = match config.store_backend {
        StoreBackend::Memory => {
            println!(
                "{}⚠️  STORE_BACKEND=memory: results are discarded when this run exits{}",
                YELLOW, RESET
            );
            Arc::new(InMemoryGeoStore::new())
        }
        StoreBackend::Postgres => {
            let pool = config::init_db_pool(config)
                .await
                .context("failed to connect to database")?;
            let store = PgGeoStore::new(pool);
            store
                .ensure_schema()
                .await
                .context("failed to prepare geo cache schema")?;
            Arc::new(store)
        }
    };
    Ok(store)
}

fn build_directory(config: &Config) -> Result<Arc<dyn VenueDirectory>> {
    let directory: Arc<dyn VenueDirectory> = match config.provider_mode {
        ProviderMode::Live => {
            Arc::new(BestTimeClient::from_config(config).context("failed to build BestTime client")?)
        }
        ProviderMode::Fixture => Arc::new(
            FixtureVenueDirectory::from_file(&config.provider_fixture_path)
                .with_context(|| format!("failed to load {}", config.provider_fixture_path))?,
        ),
    };
    Ok(directory)
}

fn print_header(command: Command, config: &Config) {
    println!("{}╔══════════════════════════════════════════════════════════════╗{}", CYAN, RESET);
    println!("{}║   📍 crowd-sense one-shot refresh                            ║{}", CYAN, RESET);
    println!("{}╚══════════════════════════════════════════════════════════════╝{}", CYAN, RESET);
    println!(
        "\n{}Command:{} {:?}   {}Store:{} {:?}   {}Provider:{} {:?}",
        BOLD, RESET, command, BOLD, RESET, config.store_backend, BOLD, RESET, config.provider_mode
    );
}

fn print_seeds(config: &Config) {
    println!(
        "\n{}🌱 {} seed locations ({:?} mode){}",
        BOLD,
        config.discovery.seeds.len(),
        config.discovery.mode,
        RESET
    );
    for line in describe_seeds(&config.discovery.seeds) {
        println!("  • {}", line);
    }
}

fn print_refresh_stats(stats: &RefreshStats) {
    println!("\n{}📋 Discovery Summary{} (run {})", BOLD, RESET, stats.run_id);
    println!("──────────────────────────────────────────────────────────────");
    if stats.mode == "search" {
        println!(
            "  • Search jobs: {} started, {}{}{} finished, {}{}{} abandoned",
            stats.handles_started,
            GREEN,
            stats.handles_finished,
            RESET,
            YELLOW,
            stats.handles_abandoned,
            RESET
        );
    }
    println!("  • Venues received: {}{}{}", BLUE, stats.venues_received, RESET);
    println!("  • Venues upserted: {}{}{}", GREEN, stats.venues_upserted, RESET);
    println!("  • Duplicates skipped: {}{}{}", YELLOW, stats.duplicates_skipped, RESET);
    println!("  • Invalid skipped: {}", stats.invalid_skipped);
    println!("  • Upsert failures: {}", stats.upsert_failures);
    println!(
        "  • Live forecasts: {} cached, {} invalidated",
        stats.live_cached, stats.live_invalidated
    );
    print_errors(&stats.errors);
}

fn print_forecast_stats(title: &str, stats: &ForecastStats) {
    println!("\n{}📋 {}{}", BOLD, title, RESET);
    println!("──────────────────────────────────────────────────────────────");
    println!("  • Venues processed: {}{}{}", BLUE, stats.venues_processed, RESET);
    println!(
        "  • Live forecasts: {}{}{} cached, {} invalidated",
        GREEN, stats.live_cached, RESET, stats.live_invalidated
    );
    println!(
        "  • Weekly days cached: {}{}{} ({} venues skipped)",
        GREEN, stats.weekly_days_cached, RESET, stats.weekly_skipped
    );
    println!("  • Failures: {}", stats.failures);
    print_errors(&stats.errors);
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("{}⚠️  {} errors:{}", YELLOW, errors.len(), RESET);
    for e in errors.iter().take(10) {
        println!("    {}", e);
    }
    if errors.len() > 10 {
        println!("    ... and {} more", errors.len() - 10);
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    if command == Command::Seeds {
        print_seeds(config);
        return Ok(());
    }

    let store = build_store(config).await?;
    let directory = build_directory(config)?;
    let refresher = VenueRefresher::new(
        VenueCacheDao::new(store),
        directory,
        config.discovery.clone(),
    );
    let fetch_live = config.discovery.fetch_live_after_upsert;

    println!("\n{}🚀 Running...{}", BOLD, RESET);
    match command {
        Command::Discovery => {
            print_seeds(config);
            let stats = refresher.run_discovery(fetch_live).await;
            print_refresh_stats(&stats);
        }
        Command::Search => {
            print_seeds(config);
            let stats = refresher
                .refresh_by_search(config.discovery.initial_wait, fetch_live)
                .await;
            print_refresh_stats(&stats);
        }
        Command::Filter => {
            print_seeds(config);
            let stats = refresher.refresh_by_filter_for_seeds(fetch_live).await;
            print_refresh_stats(&stats);
        }
        Command::Known => {
            let stats = refresher.refresh_known_venues().await?;
            print_refresh_stats(&stats);
        }
        Command::Live => {
            let stats = refresher.forecasts().refresh_all_known().await?;
            print_forecast_stats("Live Forecast Summary", &stats);
        }
        Command::Cached => {
            let stats = refresher.forecasts().refresh_cached().await?;
            print_forecast_stats("Cached Live Forecast Summary", &stats);
        }
        Command::Weekly => {
            let stats = refresher.forecasts().refresh_weekly().await?;
            print_forecast_stats("Weekly Forecast Summary", &stats);
        }
        Command::Seeds => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    let config = Config::from_env();
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "warn");
    }
    env_logger::init();

    let command = match Command::parse(env::args().nth(1).as_deref()) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}❌ {}{}", RED, e, RESET);
            std::process::exit(2);
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("{}❌ Configuration error: {}{}", RED, e, RESET);
        std::process::exit(1);
    }

    print_header(command, &config);

    let started = Instant::now();
    match run(command, &config).await {
        Ok(()) => println!(
            "\n{}✨ Completed in {:.1}s{}",
            GREEN,
            started.elapsed().as_secs_f64(),
            RESET
        ),
        Err(e) => {
            eprintln!("\n{}❌ Refresh failed: {:#}{}", RED, e, RESET);
            std::process::exit(1);
        }
    }
}
