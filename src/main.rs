// Conference Admin Server - HTTP API of the conference console

use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use conference_admin::{admin_interface::create_admin_router, app_state::AppState, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    // Build main application router
    let app = Router::new()
        .nest("/api/v1", create_admin_router(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = config.server_address();
    println!("🚀 Conference Admin Server starting on http://{}", addr);
    println!("📋 API Documentation:");
    println!("  GET    /api/v1/health                          - Store connectivity");
    println!("  POST   /api/v1/auth/login                      - Admin login");
    println!("  GET    /api/v1/programs                        - List programs");
    println!("  POST   /api/v1/programs                        - Create program");
    println!("  GET    /api/v1/dashboard                       - Dashboard statistics");
    println!("  GET    /api/v1/users?search=                   - Merged user directory");
    println!("  GET    /api/v1/database/export/{{collection}}    - Export a collection");
    println!("  POST   /api/v1/database/clear/{{collection}}     - Clear a collection");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
