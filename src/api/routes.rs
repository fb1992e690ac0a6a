/// HTTP API routes
use crate::api::models::*;
use crate::db::Database;
use crate::domain::models::{BetRecord, BetSlip, SlipRequest, WalletAccount};
use crate::service::{PlacedBet, ServiceError, SlipwayService};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state
pub struct AppState<D: Database> {
    pub service: Arc<SlipwayService<D>>,
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// ===== Slip Routes =====

/// Validate and price a slip without placing it
pub async fn quote_slip<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(req): Json<SlipRequest>,
) -> Result<Json<BetSlip>, ApiError> {
    tracing::debug!("🧾 Quoting {} slip with {} legs", req.bet_type, req.legs.len());

    let slip = state.service.quote(&req).map_err(ServiceError::Rejected)?;

    Ok(Json(slip))
}

/// Place a bet for a user
pub async fn place_bet<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SlipRequest>,
) -> Result<Json<PlacedBet>, ApiError> {
    tracing::info!(
        "💰 User {} placing {} | Stake: {} | Legs: {}",
        user_id,
        req.bet_type,
        req.stake,
        req.legs.len()
    );

    let placed = state.service.place_bet(user_id, req).await?;

    tracing::info!(
        "✅ Bet {} accepted | Potential payout: {}",
        placed.bet.id,
        placed.bet.potential_payout
    );

    Ok(Json(placed))
}

/// Get all bets placed by a user
pub async fn get_user_bets<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<BetsResponse>, ApiError> {
    let bets = state.service.get_bets_for_user(user_id).await?;
    Ok(Json(BetsResponse { bets }))
}

pub async fn get_bet<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(bet_id): Path<Uuid>,
) -> Result<Json<BetRecord>, ApiError> {
    let bet = state.service.get_bet(bet_id).await?;
    Ok(Json(bet))
}

// ===== Wallet Routes =====

pub async fn open_wallet<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Json(req): Json<OpenWalletRequest>,
) -> Result<Json<WalletAccount>, ApiError> {
    let account = state
        .service
        .open_wallet(req.user_id, req.opening_balance)
        .await?;

    tracing::info!(
        "👛 Wallet opened for {} | Balance: {}",
        account.user_id,
        account.balance
    );

    Ok(Json(account))
}

pub async fn get_wallet<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<WalletAccount>, ApiError> {
    let account = state.service.get_wallet(user_id).await?;
    Ok(Json(account))
}

pub async fn deposit<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<WalletAccount>, ApiError> {
    let account = state.service.deposit(user_id, req.amount).await?;
    Ok(Json(account))
}

/// Release a held reservation after a downstream failure
pub async fn release_reservation<D: Database + 'static>(
    State(state): State<AppState<D>>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    tracing::info!("↩️  Releasing reservation {}", reservation_id);

    let released = state.service.release_reservation(reservation_id).await?;

    Ok(Json(ReleaseResponse {
        reservation_id,
        released,
    }))
}

// ===== Error Handling =====

pub struct ApiError(anyhow::Error);

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.downcast_ref::<ServiceError>() {
            Some(ServiceError::Rejected(result)) => {
                tracing::warn!("🚫 Slip rejected: {}", result);
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(RejectionResponse::from(result)),
                )
                    .into_response();
            }
            Some(ServiceError::InsufficientFunds { .. }) => StatusCode::CONFLICT,
            Some(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(ServiceError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Some(ServiceError::Storage(_)) | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_message = self.0.to_string();
        if status.is_server_error() {
            tracing::error!("❌ API Error: {}", error_message);
        } else {
            tracing::warn!("⚠️  API Error ({}): {}", status, error_message);
        }

        (
            status,
            Json(ErrorResponse {
                error: error_message,
            }),
        )
            .into_response()
    }
}
