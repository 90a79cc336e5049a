use axum::{middleware::from_fn, routing::get, Extension, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use pagecraft_api::blob::FsBlobStore;
use pagecraft_api::config;
use pagecraft_api::context::AppContext;
use pagecraft_api::database::{PgDocumentStore, PAGES_COLLECTION};
use pagecraft_api::handlers::{items, pages, roles, users};
use pagecraft_api::middleware::jwt_auth_middleware;

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = config::config();
    tracing_subscriber::fmt::init();
    tracing::info!("Starting pagecraft API in {:?} mode", config.environment);

    let store = PgDocumentStore::connect()
        .await
        .unwrap_or_else(|e| panic!("failed to connect document store: {}", e));
    let blobs = FsBlobStore::new(
        config.blob.root_dir.clone(),
        config.blob.public_base_url.clone(),
    );

    let ctx = AppContext::new(Arc::new(store), Arc::new(blobs));
    ctx.init_system_collections()
        .await
        .unwrap_or_else(|e| panic!("failed to create system collections: {}", e));

    let app = app(ctx, &config.blob.root_dir);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(5000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("Server running on port {}", port);

    axum::serve(listener, app).await.expect("server");
}

fn app(ctx: AppContext, uploads_dir: &str) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        // Authenticated API
        .merge(protected_routes())
        // Uploaded blobs served statically
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        // Global middleware
        .layer(Extension(ctx))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router {
    use axum::routing::post;

    Router::new()
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
}

fn protected_routes() -> Router {
    use axum::routing::{delete, post, put};

    Router::new()
        // User management
        .route("/api/users", get(users::list))
        .route("/api/users/:id", put(users::update).delete(users::delete))
        // Page catalog
        .route("/api/pages", post(pages::create).get(pages::list))
        .route("/api/pages/role", get(pages::list_for_role))
        .route(
            "/api/pages/:key",
            get(pages::get_by_slug)
                .put(pages::update)
                .delete(pages::delete),
        )
        // Role catalog
        .route("/api/roles", post(roles::create).get(roles::list))
        .route("/api/roles/:id", put(roles::update).delete(roles::delete))
        // Dynamic items, permission-checked per action
        .route("/api/dynamic/:slug", get(items::list).post(items::create))
        .route(
            "/api/dynamic/:slug/:id",
            get(items::get).put(items::update).delete(items::delete),
        )
        .route_layer(from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "Pagecraft API",
            "version": version,
            "description": "RBAC-gated content API with admin-defined dynamic pages",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/api/users/register, /api/users/login (public)",
                "users": "/api/users[/:id] (protected)",
                "pages": "/api/pages[/:key], /api/pages/role (protected)",
                "roles": "/api/roles[/:id] (protected)",
                "dynamic": "/api/dynamic/:slug[/:id] (protected, permission-checked)",
                "uploads": "/uploads/:key (public)",
            }
        }
    }))
}

async fn health(Extension(ctx): Extension<AppContext>) -> impl axum::response::IntoResponse {
    use pagecraft_api::database::store::Document;

    let now = chrono::Utc::now();

    match ctx.store.find(PAGES_COLLECTION, &Document::new()).await {
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
