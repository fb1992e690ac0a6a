/// HTTP server
use crate::api::routes::{self, AppState};
use crate::db::Database;
use crate::service::SlipwayService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Run the HTTP server
pub async fn run_server<D>(service: SlipwayService<D>, port: u16) -> anyhow::Result<()>
where
    D: Database + 'static,
{
    let state = AppState {
        service: Arc::new(service),
    };

    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🎟️  Slipway API Server Started!");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📡 HTTP API:    http://localhost:{}", port);
    println!("❤️  Health:      http://localhost:{}/health", port);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    tracing::info!("🎟️  Slipway API server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn create_router<D: Database + 'static>(state: AppState<D>) -> Router {
    Router::new()
        // Slip routes
        .route("/api/slips/quote", post(routes::quote_slip::<D>))
        .route(
            "/api/users/:user_id/bets",
            get(routes::get_user_bets::<D>).post(routes::place_bet::<D>),
        )
        .route("/api/bets/:bet_id", get(routes::get_bet::<D>))
        // Wallet routes
        .route("/api/wallets", post(routes::open_wallet::<D>))
        .route("/api/wallets/:user_id", get(routes::get_wallet::<D>))
        .route(
            "/api/wallets/:user_id/deposit",
            post(routes::deposit::<D>),
        )
        .route(
            "/api/reservations/:reservation_id/release",
            post(routes::release_reservation::<D>),
        )
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}
