use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use postrank_common::PostRankError;
use postrank_engine::ScoringJob;
use postrank_server::{build_router, AppState, ServerConfig};
use postrank_store::PgScoringStore;

#[derive(Parser)]
#[command(name = "postrank-server", about = "Post quality and spam scoring service")]
struct Cli {
    /// Run one scoring pass, print the summary and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = ServerConfig::from_env()?;
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| PostRankError::Database(e.to_string()))?;

    info!(max_connections = config.database_max_connections, "Connected to database");

    let store = Arc::new(PgScoringStore::new(pool));
    let job = Arc::new(ScoringJob::new(
        store.clone(),
        store.clone(),
        store,
        config.scoring.clone(),
    )?);

    if cli.once {
        let stats = job.run(Utc::now()).await?;
        println!("{stats}");
        return Ok(());
    }

    let state = Arc::new(AppState::new(job, config.job_secret.clone()));
    let app = build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Scoring trigger listening");
    axum::serve(listener, app).await?;

    Ok(())
}
