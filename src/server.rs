use std::{net::SocketAddr, time::Duration};

use axum::{extract::FromRef, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    authentication::JwtKeys,
    database::{PoolOptions, PostgresConnection},
    repos::Repositories,
};

pub struct Options {
    pub database_pool_size: u32,
    pub database_timeout_seconds: u8,
    pub database_url: Option<String>,
    pub in_memory: bool,

    pub listen_address: SocketAddr,

    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub jwt_issuer: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    repos: Repositories,
    jwt_keys: JwtKeys,
}

impl AppState {
    pub fn new(repos: Repositories, jwt_keys: JwtKeys) -> Self {
        Self { repos, jwt_keys }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/v1", crate::bookkeeping::http::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(opts: Options) -> anyhow::Result<()> {
    let repos = if opts.in_memory {
        info!("Using in-memory storage. Data will be lost on shutdown.");

        Repositories::in_memory()
    } else {
        let database_url = opts
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("A database URL is required unless --in-memory is set."))?;

        let connection = PostgresConnection::connect(PoolOptions {
            url: database_url,
            max_connections: opts.database_pool_size,
            acquire_timeout: Duration::from_secs(opts.database_timeout_seconds.into()),
        })
        .await?;

        Repositories::postgres(connection)
    };

    let jwt_keys = JwtKeys::new(
        &opts.jwt_secret,
        opts.jwt_audience.as_deref(),
        opts.jwt_issuer.as_deref(),
    );

    let app = app(AppState::new(repos, jwt_keys));

    info!(address = %opts.listen_address, "Starting server.");

    axum::Server::bind(&opts.listen_address)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_keys.clone()
    }
}

impl FromRef<AppState> for Repositories {
    fn from_ref(state: &AppState) -> Self {
        state.repos.clone()
    }
}
