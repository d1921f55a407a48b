#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Extension;
use axum::Router;
use axum::routing::get;
use axum_client_ip::ClientIpSource;
use serde_json::Value;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::prelude::*;

use crate::api::Success;
use crate::api::router;
use crate::config::Config;
use crate::mailer::LogMailer;
use crate::mailer::SharedMailer;
use crate::rate_limit::RateLimiter;
use crate::storage::Storage;
use crate::storage::setup;
use crate::tokens::Tokens;
use crate::utils::env_var_or_else;

mod access;
mod api;
mod client_ip;
mod config;
mod error;
mod graceful_shutdown;
mod mailer;
mod notes;
mod notifications;
mod password;
mod rate_limit;
mod sharing;
mod storage;
#[cfg(test)]
mod tests;
mod tokens;
mod users;
mod utils;
mod validation;

const DEFAULT_RUST_LOG: &str = "notery=debug,tower_http=debug";
const DEFAULT_ADDRESS: &str = "0.0.0.0:5050";

#[tokio::main]
async fn main() -> Result<()> {
    setup_environment();
    setup_tracing();

    let app = setup_app()
        .await?
        .layer(ClientIpSource::ConnectInfo.into_extension());

    let address = setup_address()?;
    tracing::info!("Listening on {}", address);

    let listener = TcpListener::bind(&address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown::handler())
    .await?;

    Ok(())
}

/// Create and setup the app with its dependencies
///
/// # Errors
///
/// Will return `Err` if any of its dependencies fail to load:
/// - Storage connection
pub async fn setup_app() -> Result<Router> {
    let storage = setup().await?;
    let config = Config::from_env();
    let mailer: SharedMailer = Arc::new(LogMailer);

    Ok(create_router(storage, mailer, config))
}

/// Create the router for Notery
fn create_router<S: Storage>(storage: S, mailer: SharedMailer, config: Config) -> Router {
    let tokens = Tokens::new(&config);
    let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);

    Router::new()
        .route("/health", get(health))
        .nest("/api", router::<S>())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(storage))
        .layer(Extension(tokens))
        .layer(Extension(rate_limiter))
        .layer(Extension(mailer))
        .layer(Extension(config))
}

async fn health() -> Success<Value> {
    Success::ok(json!({ "ok": true }))
}

fn setup_environment() {
    dotenvy::dotenv().ok();
}

fn setup_tracing() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::registry;

    registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_RUST_LOG.into()),
        ))
        .with(fmt::layer())
        .init();
}

fn setup_address() -> Result<SocketAddr> {
    let mut address =
        env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS)).parse::<SocketAddr>()?;

    // optional override of just the port
    if let Ok(port) = std::env::var("PORT") {
        // only check non-empty strings
        if !port.is_empty() {
            let port = port.parse::<u16>()?;

            address.set_port(port);
        }
    }

    Ok(address)
}
