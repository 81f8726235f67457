use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use dotenv::dotenv;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tokomail_core::payment::PaymentGateway;
use tokomail_core::whatsapp::WhatsappClient;
use tokomail_core::{admin, auth, checkout, db, webhooks, AppState, Config, FulfillmentEngine};

/// Health check endpoint for monitoring and load balancers.
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "tokomail-core",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Verifies that the database connection is working.
async fn db_health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        })?;

    Ok(Json(serde_json::json!({
        "status": "ok",
        "database": "connected"
    })))
}

/// Sets up all routes and middleware for the storefront API.
fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/mark-paid", post(admin::mark_paid))
        .route("/admin/logs", get(admin::list_logs))
        .route("/admin/stock", get(admin::list_stock).post(admin::add_stock))
        .route("/admin/stock/bulk", post(admin::add_stock_bulk))
        .route("/admin/stock/:id", delete(admin::delete_stock))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        // Public routes
        .route("/health", get(health_check))
        .route("/health/db", get(db_health_check))
        .route("/api/products", get(checkout::list_products))
        .route("/api/orders", post(checkout::create_order))
        .route("/api/orders/:id", get(checkout::get_order))
        .route("/api/orders/:id/payment", get(checkout::payment_status))
        // Gateway callbacks
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        .route("/webhooks/transaction", post(webhooks::transaction_webhook))
        // Admin surface
        .route("/admin/login", post(admin::login))
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(LevelFilter::INFO.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    info!("Starting TokoMail Core Server...");

    let config = Arc::new(Config::from_env()?);

    // Initialize database connection pool
    let db_pool = db::create_pool(&config.database_url).await?;

    let whatsapp = WhatsappClient::new(&config);
    let engine = Arc::new(FulfillmentEngine::new(db_pool.clone(), whatsapp));
    let gateway = PaymentGateway::new(&config);

    let app_state = AppState {
        db: db_pool,
        config: config.clone(),
        engine,
        gateway,
    };

    let app = create_router(app_state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.server_host, config.server_port))
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to bind to {}:{}: {}",
                    config.server_host,
                    config.server_port,
                    e
                )
            })?;

    info!(
        "Server listening on {}:{}",
        config.server_host, config.server_port
    );

    // Start the server
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
