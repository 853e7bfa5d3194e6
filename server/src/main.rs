// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use server::assignment::AssignmentStrategy;
use server::{database, routes};

use axum::http::HeaderName;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

// Defaults, overridable through the environment.
const MAIN_DB_URL: &str = "sqlite://database/sqlite.db";
const MAIN_BIND_ADDR: &str = "0.0.0.0:3000";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the server...");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| MAIN_DB_URL.to_string());
    let db_pool = match database::establish_connection_pool(&database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    let strategy = match std::env::var("ASSIGNMENT_STRATEGY") {
        Ok(value) => match value.parse::<AssignmentStrategy>() {
            Ok(strategy) => strategy,
            Err(e) => {
                tracing::warn!("{}; falling back to the default strategy", e);
                AssignmentStrategy::default()
            }
        },
        Err(_) => AssignmentStrategy::default(),
    };
    tracing::info!("Auto-assignment strategy: {:?}", strategy);

    let state = routes::AppState::new(db_pool, strategy);
    let app_routes = routes::create_router(state);

    // The gateway in front of us handles authentication; we only need
    // permissive CORS for the actor headers it forwards.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
            HeaderName::from_static("x-actor-id"),
            HeaderName::from_static("x-actor-role"),
        ])
        .allow_origin(Any);

    let app = app_routes.layer(cors);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| MAIN_BIND_ADDR.to_string());
    let addr: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid BIND_ADDR '{}': {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("The server listens on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
