use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};

use faultline::bootstrap;
use faultline::config;
use faultline::db;
use faultline::routes;
use faultline::services::FingerprintPolicy;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting Faultline server on {}:{}", config.host, config.port);

    // Create database pool
    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Run migrations
    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Create bootstrap project if requested
    match bootstrap::create_project_if_needed(&db_pool, config.bootstrap_project.as_deref()).await
    {
        Ok(Some(project)) => {
            let base_url = format!("http://{}:{}", config.host, config.port);
            // stderr rather than the log: the DSN carries the project key
            eprintln!();
            eprintln!("==============================================");
            eprintln!("PROJECT CREATED: {}", project.name);
            eprintln!("DSN: {}", project.dsn(&base_url));
            eprintln!("==============================================");
            eprintln!();
        }
        Ok(None) => {}
        Err(e) => log::error!("Failed to create bootstrap project: {}", e),
    }

    let policy = FingerprintPolicy::new(config.ingest.fingerprint_frame_depth);
    log::info!(
        "Fingerprinting with top {} frames, speculative decompression {}",
        policy.frame_depth(),
        if config.ingest.speculative_decompression { "on" } else { "off" }
    );

    // Clone values for the closure
    let host = config.host.clone();
    let port = config.port;

    let server = HttpServer::new(move || {
        // SDKs post from any origin
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            // Headers used by Sentry SDKs
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::CONTENT_ENCODING,
                actix_web::http::header::HeaderName::from_static("x-sentry-auth"),
                actix_web::http::header::HeaderName::from_static("x-faultline-actor"),
            ])
            .max_age(3600);

        App::new()
            // Share database pool, config and grouping policy with all handlers
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(policy.clone()))
            // Middleware
            .wrap(middleware::Logger::default())
            // Response compression only
            .wrap(middleware::Compress::default())
            .wrap(cors)
            // Routes
            .configure(routes::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    // Spawn graceful shutdown handler
    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            // Wait forever if signal handler fails
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
