use axum::{middleware, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use todo_api_rust::database::manager::DatabaseManager;
use todo_api_rust::handlers::todos;
use todo_api_rust::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = todo_api_rust::config::config();
    tracing::info!("Starting todo API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override the port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("todo API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Protected API
        .merge(todo_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn todo_routes() -> Router {
    Router::new()
        // Collection operations
        .route(
            "/api/todos",
            get(todos::todo_list).post(todos::todo_create),
        )
        // Single-resource operations (ownership-gated)
        .route(
            "/api/todos/:id",
            get(todos::todo_show)
                .patch(todos::todo_update)
                .delete(todos::todo_delete),
        )
        .layer(middleware::from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Todo API (Rust)",
            "version": version,
            "description": "Multi-user todo REST API built with Axum",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "todos": "/api/todos[/:id] (protected)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
