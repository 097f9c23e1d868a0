//! PageHub server
//!
//! Entry point: configuration loading, database migrations, GitHub
//! repository reachability probe, and HTTP server startup. When the
//! repository cannot be reached the service still binds, but serves a
//! maintenance router (health 200 / everything else 503) until restarted
//! with working configuration.

use std::sync::Arc;

use axum::{http::StatusCode, Router};
use tokio::net::TcpListener;

use pagehub_github::{GithubPublisher, Publisher};
use pagehub_server::state::AppState;

mod cli;
mod config_helpers;
mod tracing_setup;

use cli::CliArgs;
use config_helpers::{database_config_from_config, parse_bind_address, service_unavailable_handler};
use tracing_setup::install_tracing_from_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eprintln!("[STARTUP] PageHub server starting...");
    let args = CliArgs::parse();

    if args.help_requested {
        CliArgs::print_help();
        return Ok(());
    }

    // Resolve config path: CLI > environment variable
    let config_path = args
        .config_path
        .or_else(|| std::env::var("PAGEHUB_CONFIG_PATH").ok());

    eprintln!("[STARTUP] Loading config from: {:?}", config_path);
    let config = load_config(&config_path)?;
    pagehub_config::validate_config(&config)
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    eprintln!("[STARTUP] Config loaded successfully");

    install_tracing_from_config(&config.logging);

    // Create and migrate database
    eprintln!("[STARTUP] Setting up database...");
    let db_cfg = database_config_from_config(&config);
    let db_pool = pagehub_db::create_pool(&db_cfg).await?;
    run_migrations(&db_cfg, &db_pool).await?;
    eprintln!("[STARTUP] Database ready");

    tracing::info!(
        db_url = %db_cfg.url,
        repo = %config.github.repo,
        branch = %config.github.branch,
        "storage and repository configuration"
    );

    // Probe the publishing repository. Unreachable is not fatal: the
    // service starts in maintenance mode so the failure is observable.
    let publisher = GithubPublisher::new(
        &config.github.token,
        &config.github.repo,
        &config.github.branch,
    );
    let (state, maintenance_msg) = match publisher.verify_repo().await {
        Ok(()) => {
            tracing::info!(repo = %config.github.repo, "GitHub repository reachable");
            let state = AppState::new(db_pool, Arc::new(publisher));
            (Some(Arc::new(state)), None)
        }
        Err(reason) => {
            tracing::error!(
                error = %reason,
                repo = %config.github.repo,
                "cannot reach GitHub repository; entering maintenance mode"
            );
            (None, Some(reason.to_string()))
        }
    };

    let app = build_app(state, maintenance_msg);

    let addr = parse_bind_address(&config.server.host, config.server.port);
    let listener = TcpListener::bind(addr).await?;
    eprintln!(
        "[STARTUP] Server listening on {}:{}",
        config.server.host, config.server.port
    );

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Load configuration from file or defaults.
fn load_config(path: &Option<String>) -> anyhow::Result<pagehub_config::Config> {
    match path.as_deref() {
        Some(p) => pagehub_config::load_config(Some(p)).map_err(|e| {
            eprintln!("failed to load configuration: {e}");
            anyhow::anyhow!(e.to_string())
        }),
        None => pagehub_config::load_config::<&std::path::Path>(None).map_err(|e| {
            eprintln!("failed to load configuration: {e}");
            anyhow::anyhow!(e.to_string())
        }),
    }
}

/// Run database migrations based on the database type.
async fn run_migrations(
    db_cfg: &pagehub_db::DbConnectionConfig,
    db_pool: &pagehub_db::DbPool,
) -> anyhow::Result<()> {
    let url_lower = db_cfg.url.to_lowercase();

    let migrate_res = if url_lower.starts_with("postgres") || url_lower.contains("postgresql") {
        tracing::info!(db_url = %db_cfg.url, "applying Postgres migrations");
        pagehub_migrations::postgres_migrator().run(db_pool).await
    } else if url_lower.starts_with("mysql") {
        tracing::info!(db_url = %db_cfg.url, "applying MySQL migrations");
        pagehub_migrations::mysql_migrator().run(db_pool).await
    } else {
        tracing::info!(db_url = %db_cfg.url, "applying SQLite migrations");
        pagehub_migrations::sqlite_migrator().run(db_pool).await
    };

    match migrate_res {
        Ok(_) => {
            tracing::info!("database migrations applied successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!(%e, "failed to apply database migrations");
            Err(anyhow::anyhow!("failed to apply database migrations: {e}"))
        }
    }
}

/// Build the application router, either normal or maintenance mode.
fn build_app(state: Option<Arc<AppState>>, maintenance_msg: Option<String>) -> Router {
    if let Some(state_arc) = state {
        pagehub_server::build_router(state_arc)
    } else {
        let msg = maintenance_msg.unwrap_or_else(|| "maintenance".to_string());
        tracing::info!(%msg, "starting maintenance router");
        Router::new()
            .route(
                "/health",
                axum::routing::get(|| async { (StatusCode::OK, "OK") }),
            )
            .route(
                "/ready",
                axum::routing::get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .fallback(service_unavailable_handler)
    }
}
