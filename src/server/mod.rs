//! HTTP surface: router, shared state, and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::catalog::CatalogRegistry;
use crate::config::ServerConfig;

pub mod envelope;
pub mod handlers;
pub mod models;
pub mod pool;
pub mod session;
pub mod streaming;

use handlers::{
    aggregate_get, attribute_delete, attribute_get, attributegroup_get, entity_delete, entity_get,
    entity_post, entity_put, health_check, model_get, model_refresh, textfacet_get,
};

/// Request body cap for writes.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub struct AppState {
    pub config: ServerConfig,
    pub registry: CatalogRegistry,
    pub pools: pool::CatalogPools,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/catalog/{id}/entity/{*rest}",
            get(entity_get)
                .put(entity_put)
                .post(entity_post)
                .delete(entity_delete),
        )
        .route(
            "/catalog/{id}/attribute/{*rest}",
            get(attribute_get).delete(attribute_delete),
        )
        .route("/catalog/{id}/attributegroup/{*rest}", get(attributegroup_get))
        .route("/catalog/{id}/aggregate/{*rest}", get(aggregate_get))
        .route("/catalog/{id}/textfacet/{*rest}", get(textfacet_get))
        .route("/catalog/{id}/model", get(model_get))
        .route("/catalog/{id}/model/refresh", post(model_refresh))
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

pub async fn run() {
    dotenv().ok();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    run_with_config(config).await;
}

pub async fn run_with_config(config: ServerConfig) {
    dotenv().ok();

    log::info!(
        "Server configuration: http={}:{}, registry={}, default_limit={}",
        config.http_host,
        config.http_port,
        config.registry_path,
        config.default_limit
    );

    let registry = match CatalogRegistry::from_yaml_file(&config.registry_path) {
        Ok(registry) => registry,
        Err(e) => {
            log::error!("Failed to load catalog registry: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Loaded {} catalog(s) from registry", registry.entries().len());

    let pools = match pool::CatalogPools::new(&config, &registry) {
        Ok(pools) => pools,
        Err(e) => {
            log::error!("Failed to create connection pools: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        pools,
    });
    let app = build_router(state);

    let bind_address = format!("{}:{}", config.http_host, config.http_port);
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => {
            log::info!("Successfully bound HTTP listener to {}", bind_address);
            listener
        }
        Err(e) => {
            log::error!("Failed to bind HTTP listener to {}: {}", bind_address, e);
            log::error!("Is another process using port {}?", config.http_port);
            std::process::exit(1);
        }
    };

    println!("ermgate server is running");
    println!("  HTTP API: http://{}", bind_address);

    if let Err(e) = axum::serve(listener, app).await {
        log::error!("HTTP server fatal error: {:?}", e);
        std::process::exit(1);
    }
}
