/// Service layer - orchestrates slip building and wallet/bet storage
///
/// Pricing is pure and happens first. Money only moves once a slip is
/// accepted, and a reservation that cannot be turned into a bet record is
/// released before placement finishes, even when the caller has gone away.
use crate::db::{Database, DbError};
use crate::domain::models::{
    BetRecord, BetSlip, Reservation, SlipRequest, ValidationResult, WalletAccount,
};
use crate::domain::slip::BetSlipBuilder;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Bet slip rejected: {0}")]
    Rejected(ValidationResult),

    #[error("Insufficient funds: {requested} requested")]
    InsufficientFunds { user_id: Uuid, requested: Decimal },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ServiceError::NotFound(what),
            DbError::InsufficientFunds { user_id, requested } => {
                ServiceError::InsufficientFunds { user_id, requested }
            }
            DbError::Constraint(msg) => ServiceError::InvalidRequest(msg),
            DbError::Internal(msg) => ServiceError::Storage(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// An accepted bet and the reservation holding its stake
#[derive(Debug, Clone, Serialize)]
pub struct PlacedBet {
    pub bet: BetRecord,
    pub reservation_id: Uuid,
}

pub struct SlipwayService<D: Database> {
    db: Arc<D>,
    builder: BetSlipBuilder,
}

impl<D: Database + 'static> SlipwayService<D> {
    pub fn new(db: Arc<D>, builder: BetSlipBuilder) -> Self {
        Self { db, builder }
    }

    pub fn builder(&self) -> &BetSlipBuilder {
        &self.builder
    }

    /// Validate and price a slip without touching any wallet
    pub fn quote(&self, request: &SlipRequest) -> Result<BetSlip, ValidationResult> {
        self.builder.build_request(request)
    }

    /// Price a slip, reserve its stake and record the bet.
    ///
    /// Reserving and recording run on their own task. If the caller goes
    /// away mid-placement the task still either records the bet or
    /// releases the stake.
    pub async fn place_bet(&self, user_id: Uuid, request: SlipRequest) -> ServiceResult<PlacedBet> {
        let slip = self.builder.build_request(&request).map_err(|rejected| {
            tracing::warn!(
                %user_id,
                bet_type = %request.bet_type,
                errors = rejected.errors.len(),
                "Bet slip rejected: {}",
                rejected
            );
            ServiceError::Rejected(rejected)
        })?;

        let db = Arc::clone(&self.db);
        tokio::spawn(reserve_and_record(db, user_id, slip))
            .await
            .map_err(|e| {
                tracing::error!(%user_id, error = %e, "Bet placement task failed");
                ServiceError::Storage(format!("Bet placement task failed: {}", e))
            })?
    }

    /// Return a held stake to its wallet. Safe to call more than once.
    pub async fn release_reservation(&self, reservation_id: Uuid) -> ServiceResult<bool> {
        let released = self.db.release(reservation_id).await?;
        if released {
            tracing::info!(%reservation_id, "Reservation released");
        } else {
            tracing::debug!(%reservation_id, "Reservation already settled, nothing to release");
        }
        Ok(released)
    }

    pub async fn get_reservation(&self, reservation_id: Uuid) -> ServiceResult<Reservation> {
        Ok(self.db.get_reservation(reservation_id).await?)
    }

    /// Open a wallet. A new user id is generated when none is given.
    pub async fn open_wallet(
        &self,
        user_id: Option<Uuid>,
        opening_balance: Decimal,
    ) -> ServiceResult<WalletAccount> {
        if opening_balance < Decimal::ZERO {
            return Err(ServiceError::InvalidRequest(
                "Opening balance cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let account = WalletAccount {
            user_id: user_id.unwrap_or_else(Uuid::new_v4),
            balance: opening_balance,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        let account = self.db.create_wallet(account).await?;
        tracing::info!(user_id = %account.user_id, balance = %account.balance, "Wallet opened");
        Ok(account)
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> ServiceResult<WalletAccount> {
        Ok(self.db.get_wallet(user_id).await?)
    }

    pub async fn deposit(&self, user_id: Uuid, amount: Decimal) -> ServiceResult<WalletAccount> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidRequest(
                "Deposit must be positive".to_string(),
            ));
        }

        let account = self.db.credit_wallet(user_id, amount).await?;
        tracing::info!(%user_id, %amount, balance = %account.balance, "Deposit credited");
        Ok(account)
    }

    pub async fn get_bet(&self, bet_id: Uuid) -> ServiceResult<BetRecord> {
        Ok(self.db.get_bet(bet_id).await?)
    }

    pub async fn get_bets_for_user(&self, user_id: Uuid) -> ServiceResult<Vec<BetRecord>> {
        Ok(self.db.get_bets_for_user(user_id).await?)
    }
}

async fn reserve_and_record<D: Database>(
    db: Arc<D>,
    user_id: Uuid,
    slip: BetSlip,
) -> ServiceResult<PlacedBet> {
    let reservation = db.reserve(user_id, slip.stake()).await.map_err(|e| {
        if let DbError::InsufficientFunds { requested, .. } = &e {
            tracing::warn!(%user_id, %requested, "Insufficient funds for bet");
        }
        ServiceError::from(e)
    })?;

    tracing::debug!(
        %user_id,
        reservation_id = %reservation.id,
        amount = %reservation.amount,
        "Stake reserved"
    );

    let record = BetRecord::from_slip(user_id, reservation.id, slip);
    match db.create_bet(record).await {
        Ok(bet) => {
            tracing::info!(
                %user_id,
                bet_id = %bet.id,
                bet_type = %bet.bet_type,
                stake = %bet.stake,
                potential_payout = %bet.potential_payout,
                "Bet placed"
            );
            Ok(PlacedBet {
                bet,
                reservation_id: reservation.id,
            })
        }
        Err(e) => {
            tracing::warn!(
                reservation_id = %reservation.id,
                error = %e,
                "Failed to record bet, releasing stake"
            );
            if let Err(release_err) = db.release(reservation.id).await {
                tracing::error!(
                    reservation_id = %reservation.id,
                    error = %release_err,
                    "Failed to release reservation"
                );
            }
            Err(e.into())
        }
    }
}
