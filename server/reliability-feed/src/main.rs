//! Binary entrypoint for the reliability feed.

use std::net::SocketAddr;
use std::sync::Arc;

use reliability_engine::{Config, Engine};
use reliability_feed::{AppState, PgStore};
use sqlx_postgres::PgPool;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let database_url = std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
  let port: u16 = std::env::var("PORT")
    .unwrap_or_else(|_| "5005".into())
    .parse()
    .map_err(|_| "PORT must be a valid u16")?;
  let config = match std::env::var("RULESET_PATH") {
    Ok(path) => Config::from_file(&path)?,
    Err(_) => Config::default(),
  };
  tracing::info!(version = %config.version, "ruleset loaded");

  let pool = PgPool::connect(&database_url).await?;
  let store = PgStore::new(pool);
  store.migrate().await?;
  let state = Arc::new(AppState::new(Engine::new(config), store));

  let app = reliability_feed::router(state);

  let addr = SocketAddr::from(([127, 0, 0, 1], port));
  tracing::info!("reliability-feed listening on http://{}", addr);

  let listener = tokio::net::TcpListener::bind(addr).await?;
  axum::serve(listener, app).await?;

  Ok(())
}
