//! Dispatch worker - route planning and optimization backend
//!
//! Builds travel matrices, optimizes vehicle routes and manages the route
//! plan lifecycle over PostgreSQL.

mod config;
mod db;
mod services;
mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use services::events::EventBus;
use services::lifecycle::PlanLifecycle;
use services::matrix::{GeometryMatrixSource, HttpMatrixClient, MatrixSource};
use services::notify::{NotificationSink, TelegramNotifier};
use services::optimizer::Optimizer;
use services::solver::SolverAdapter;
use services::store::{PgPlanStore, PgTaskStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "dispatch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,dispatch_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    info!("Starting dispatch worker...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Travel matrix: external endpoint when configured, otherwise
    // straight-line geometry
    let matrix: Arc<dyn MatrixSource> = match &config.matrix_endpoint {
        Some(endpoint) => {
            info!("Travel matrix: external endpoint {}", endpoint);
            Arc::new(HttpMatrixClient::new(config.matrix()))
        }
        None => {
            info!("Travel matrix: straight-line geometry");
            Arc::new(GeometryMatrixSource)
        }
    };

    if config.solver_enabled {
        info!("VRP solver enabled: {:?}", config.solver_bin);
    } else {
        info!("VRP solver disabled, using greedy fallback");
    }
    let solver = SolverAdapter::new(config.solver());
    let defaults = config.optimize_defaults();
    info!(
        "Planning defaults: {} km/h average speed, {} vehicle capacity, {}s solver budget",
        defaults.average_speed_kmh, defaults.vehicle_capacity, defaults.time_limit_seconds
    );
    let _optimizer = Optimizer::new(matrix, solver);

    let notifier: Option<Arc<dyn NotificationSink>> = config
        .telegram()
        .map(|telegram| Arc::new(TelegramNotifier::new(telegram)) as Arc<dyn NotificationSink>);
    if notifier.is_none() {
        info!("Telegram notifications disabled");
    }

    let events = EventBus::default();
    let _lifecycle = PlanLifecycle::new(
        Arc::new(PgPlanStore::new(pool.clone())),
        Arc::new(PgTaskStore::new(pool)),
        notifier,
        events.clone(),
    );

    // Audit log of every published plan event
    let mut event_rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = event_rx.recv().await {
            info!("Plan event: {:?}", event);
        }
    });

    info!("Dispatch worker ready");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    Ok(())
}
