mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod permission;
mod ranking;
mod redisdb;
mod routes;
mod service;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use axum_client_ip::ClientIpSource;
use config::Config;
use db::DBClient;
use dotenv::dotenv;
use redisdb::RedisClient;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: DBClient,
    pub redis_client: RedisClient,
    pub ip_extraction: ClientIpSource,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    // Keep the guard alive until main returns so file logs are flushed
    let _guard = tracing_config::init_tracing();

    let config = Config::init();

    // Behind Cloudflare in production; the raw peer address locally
    let ip_source = if cfg!(debug_assertions) {
        ClientIpSource::ConnectInfo
    } else {
        ClientIpSource::CfConnectingIp
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run database migrations: {:?}", err);
        std::process::exit(1);
    }

    let redis_client = match redis::Client::open(config.redis_url.as_str()) {
        Ok(client) => match client.get_connection_manager().await {
            Ok(manager) => RedisClient::new(manager),
            Err(err) => {
                tracing::error!("Failed to connect to redis: {:?}", err);
                std::process::exit(1);
            }
        },
        Err(err) => {
            tracing::error!("Invalid redis url: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = tokio::fs::create_dir_all(&config.upload_dir).await {
        tracing::error!("Failed to create upload dir {}: {:?}", config.upload_dir, err);
        std::process::exit(1);
    }

    let frontend_origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!("FRONTEND_URL is not a valid origin: {:?}", err);
            std::process::exit(1);
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client: DBClient::new(pool),
        redis_client,
        ip_extraction: ip_source,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {:?}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {:?}", err);
    }
}
