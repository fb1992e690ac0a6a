/// Database abstraction trait
///
/// Storage is the system of record for wallets and accepted bets. The
/// engine never reads a balance and writes it back; every balance change
/// goes through one of the atomic operations below.
use crate::domain::models::{BetRecord, Reservation, WalletAccount};
use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Internal(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Insufficient funds: {requested} requested")]
    InsufficientFunds { user_id: Uuid, requested: Decimal },
}

pub type DbResult<T> = Result<T, DbError>;

#[async_trait]
pub trait Database: Send + Sync {
    // ===== Wallet Operations =====

    async fn create_wallet(&self, account: WalletAccount) -> DbResult<WalletAccount>;

    async fn get_wallet(&self, user_id: Uuid) -> DbResult<WalletAccount>;

    /// Atomically add `amount` to a balance
    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> DbResult<WalletAccount>;

    // ===== Reservation Operations =====

    /// Take `amount` from the balance if and only if the balance covers it.
    ///
    /// Must be a single conditional update: of two concurrent reservations
    /// whose sum exceeds the balance, exactly one fails with
    /// `DbError::InsufficientFunds`. Never blocks waiting for the other.
    async fn reserve(&self, user_id: Uuid, amount: Decimal) -> DbResult<Reservation>;

    /// Return a held reservation to the balance.
    ///
    /// Returns `Ok(true)` when funds were restored and `Ok(false)` when the
    /// reservation was already released or committed.
    async fn release(&self, reservation_id: Uuid) -> DbResult<bool>;

    async fn get_reservation(&self, reservation_id: Uuid) -> DbResult<Reservation>;

    // ===== Bet Operations =====

    /// Write a bet and commit its held reservation in one step
    async fn create_bet(&self, bet: BetRecord) -> DbResult<BetRecord>;

    async fn get_bet(&self, id: Uuid) -> DbResult<BetRecord>;

    async fn get_bets_for_user(&self, user_id: Uuid) -> DbResult<Vec<BetRecord>>;
}
