mod config;
mod db;
mod domain;
mod error;
mod services;
mod state;
mod tasks;
mod web;

use crate::config::AppConfig;
use crate::services::discord::DiscordClient;
use crate::state::SharedState;
use crate::tasks::handlers::{AssignCohortRoleHandler, HandlerRegistry};
use crate::tasks::processor::TaskProcessor;
use crate::tasks::store::PgTaskStore;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;
    tracing::info!("Database migrations completed");

    let discord = Arc::new(DiscordClient::new(&config.discord));
    let handlers = HandlerRegistry::new().register(Arc::new(AssignCohortRoleHandler::new(
        Arc::new(pool.clone()),
        discord,
        config.discord.cohort_roles.clone(),
    )));
    let processor = TaskProcessor::new(
        Arc::new(PgTaskStore::new(pool.clone())),
        handlers,
        &config.tasks,
    );

    let shared: SharedState = Arc::new(state::AppState {
        pool,
        session_key: config.session_key.clone(),
        task_backoff_unit: config.tasks.backoff_unit,
    });

    let scheduler = JobScheduler::new().await?;

    scheduler
        .add(Job::new_async(config.tasks.poll_cron.as_str(), move |_uuid, _l| {
            let processor = processor.clone();
            Box::pin(async move {
                if let Err(e) = processor.run_cycle().await {
                    tracing::error!("Failed to claim tasks: {:#}", e);
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Task processor: {}", config.tasks.poll_cron);

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
