// src/main.rs
// DOCUMENTATION: Application entry point
// PURPOSE: Initialize config, geo cache store, provider, refresh jobs and HTTP server

use actix_web::dev::Service;
use actix_web::{middleware::Logger, web, App, HttpServer};
use crowd_sense::config::{self, Config, ProviderMode, StoreBackend};
use crowd_sense::db::{GeoCacheStore, InMemoryGeoStore, PgGeoStore, VenueCacheDao};
use crowd_sense::handlers;
use crowd_sense::metrics;
use crowd_sense::services::{
    start_refresh_jobs, BestTimeClient, FixtureVenueDirectory, Scheduler, VenueDirectory,
    VenueRefresher, VenueService,
};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use std::time::Instant;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 1. Load environment variables
    dotenv().ok();

    // 2. Load configuration
    let config = Config::from_env();

    // 3. Initialize logging
    if std::env::var("RUST_LOG").is_err() {
        let log_level = if !config.log_level.is_empty() {
            &config.log_level
        } else {
            "info,actix_web=info,sqlx=warn"
        };
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::init();

    if let Err(e) = config.validate() {
        log::error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    log::info!("Starting crowd-sense service...");
    log::info!("Environment: {}", config.environment);
    log::info!(
        "Server Address: {}:{}",
        config.server_address,
        config.server_port
    );

    // 4. Metrics recorder
    let metrics_handle = metrics::init_metrics();

    // 5. Geo cache store
    let store: Arc<dyn GeoCacheStore> = match config.store_backend {
        StoreBackend::Memory => {
            log::info!("Using in-memory geo cache store");
            Arc::new(InMemoryGeoStore::new())
        }
        StoreBackend::Postgres => {
            let pool = match config::init_db_pool(&config).await {
                Ok(pool) => pool,
                Err(e) => {
                    log::error!("Failed to connect to database: {}", e);
                    std::process::exit(1);
                }
            };
            let store = PgGeoStore::new(pool);
            if let Err(e) = store.ensure_schema().await {
                log::error!("Failed to prepare geo cache schema: {}", e);
                std::process::exit(1);
            }
            Arc::new(store)
        }
    };
    let dao = VenueCacheDao::new(store);

    // 6. Venue directory
    let directory: Arc<dyn VenueDirectory> = match config.provider_mode {
        ProviderMode::Live => match BestTimeClient::from_config(&config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                log::error!("Failed to build BestTime client: {}", e);
                std::process::exit(1);
            }
        },
        ProviderMode::Fixture => match FixtureVenueDirectory::from_file(&config.provider_fixture_path) {
            Ok(fixture) => {
                log::info!("Using fixture provider: {}", config.provider_fixture_path);
                Arc::new(fixture)
            }
            Err(e) => {
                log::error!("Failed to load provider fixture: {}", e);
                std::process::exit(1);
            }
        },
    };

    // 7. Startup refresh chain and background jobs
    let refresher = Arc::new(VenueRefresher::new(
        dao.clone(),
        directory,
        config.discovery.clone(),
    ));
    let mut scheduler = Scheduler::new();
    start_refresh_jobs(&mut scheduler, refresher, &config);
    log::info!("Started refresh jobs: {:?}", scheduler.job_names());

    // 8. Start HTTP server
    let server_addr = format!("{}:{}", config.server_address, config.server_port);
    let venue_service = web::Data::new(VenueService::new(dao, config.serving_utc_offset_hours));

    let metrics_data = metrics_handle.map(web::Data::new);

    let result = HttpServer::new(move || {
        let mut app = App::new().app_data(venue_service.clone());
        if let Some(handle) = &metrics_data {
            app = app.app_data(handle.clone());
        }

        app
            // Middleware
            .wrap_fn(|req, srv| {
                let started = Instant::now();
                let method = req.method().to_string();
                let endpoint = req
                    .match_pattern()
                    .unwrap_or_else(|| "unmatched".to_string());
                let fut = srv.call(req);
                async move {
                    let res = fut.await?;
                    metrics::record_http_request(
                        &method,
                        &endpoint,
                        res.status().as_u16(),
                        started.elapsed(),
                    );
                    Ok(res)
                }
            })
            .wrap(Logger::default())
            .wrap(actix_web::middleware::Compress::default())
            // Routes
            .configure(handlers::health_config)
            .configure(handlers::metrics_config)
            .configure(handlers::venues_config)
    })
    .bind(&server_addr)?
    .run()
    .await;

    log::info!("HTTP server stopped, shutting down refresh jobs");
    scheduler.shutdown().await;

    result
}
