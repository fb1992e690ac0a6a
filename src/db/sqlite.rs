/// SQLite implementation of the Database trait
///
/// Balances are stored in integer cents so the reservation guard
/// (`balance_cents >= ?`) compares exact values.
use crate::db::r#trait::{Database, DbError, DbResult};
use crate::domain::models::{BetRecord, BetType, Reservation, ReservationStatus, WalletAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to :memory: opens its own database, so keep one alive
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options.journal_mode(SqliteJournalMode::Wal))
                .await?
        };
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                user_id TEXT PRIMARY KEY,
                balance_cents INTEGER NOT NULL CHECK (balance_cents >= 0),
                version INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount_cents INTEGER NOT NULL CHECK (amount_cents > 0),
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                settled_at TEXT,
                FOREIGN KEY (user_id) REFERENCES wallets(user_id)
            );

            CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                reservation_id TEXT NOT NULL UNIQUE,
                bet_type TEXT NOT NULL,
                stake TEXT NOT NULL,
                potential_payout TEXT NOT NULL,
                combined_odds TEXT,
                slip TEXT NOT NULL,
                placed_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES wallets(user_id),
                FOREIGN KEY (reservation_id) REFERENCES reservations(id)
            );

            CREATE INDEX IF NOT EXISTS idx_reservations_user ON reservations(user_id);
            CREATE INDEX IF NOT EXISTS idx_bets_user ON bets(user_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// Helper functions for serialization
fn serialize_reservation_status(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Held => "held",
        ReservationStatus::Committed => "committed",
        ReservationStatus::Released => "released",
    }
}

fn deserialize_reservation_status(s: &str) -> DbResult<ReservationStatus> {
    match s {
        "held" => Ok(ReservationStatus::Held),
        "committed" => Ok(ReservationStatus::Committed),
        "released" => Ok(ReservationStatus::Released),
        other => Err(DbError::Internal(format!("Unknown reservation status: {}", other))),
    }
}

fn to_cents(amount: Decimal) -> DbResult<i64> {
    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or_else(|| DbError::Constraint(format!("Amount {} is out of range", amount)))?;
    if !cents.fract().is_zero() {
        return Err(DbError::Constraint(format!(
            "Amount {} has more than 2 decimal places",
            amount
        )));
    }
    cents
        .to_i64()
        .ok_or_else(|| DbError::Constraint(format!("Amount {} is out of range", amount)))
}

fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn internal(e: sqlx::Error) -> DbError {
    DbError::Internal(e.to_string())
}

fn get_text(row: &SqliteRow, column: &str) -> DbResult<String> {
    row.try_get::<String, _>(column).map_err(internal)
}

fn get_uuid(row: &SqliteRow, column: &str) -> DbResult<Uuid> {
    Uuid::parse_str(&get_text(row, column)?)
        .map_err(|e| DbError::Internal(format!("Bad uuid in {}: {}", column, e)))
}

fn parse_time(value: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DbError::Internal(format!("Bad timestamp {}: {}", value, e)))
}

fn get_time(row: &SqliteRow, column: &str) -> DbResult<DateTime<Utc>> {
    parse_time(&get_text(row, column)?)
}

fn parse_decimal(value: &str) -> DbResult<Decimal> {
    Decimal::from_str(value).map_err(|e| DbError::Internal(format!("Bad decimal {}: {}", value, e)))
}

fn wallet_from_row(row: &SqliteRow) -> DbResult<WalletAccount> {
    Ok(WalletAccount {
        user_id: get_uuid(row, "user_id")?,
        balance: from_cents(row.try_get("balance_cents").map_err(internal)?),
        version: row.try_get("version").map_err(internal)?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
    })
}

fn reservation_from_row(row: &SqliteRow) -> DbResult<Reservation> {
    let settled_at: Option<String> = row.try_get("settled_at").map_err(internal)?;
    Ok(Reservation {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        amount: from_cents(row.try_get("amount_cents").map_err(internal)?),
        status: deserialize_reservation_status(&get_text(row, "status")?)?,
        created_at: get_time(row, "created_at")?,
        settled_at: settled_at.as_deref().map(parse_time).transpose()?,
    })
}

fn bet_from_row(row: &SqliteRow) -> DbResult<BetRecord> {
    let bet_type = get_text(row, "bet_type")?;
    let combined_odds: Option<String> = row.try_get("combined_odds").map_err(internal)?;
    let slip = serde_json::from_str(&get_text(row, "slip")?)
        .map_err(|e| DbError::Internal(format!("Bad slip json: {}", e)))?;

    Ok(BetRecord {
        id: get_uuid(row, "id")?,
        user_id: get_uuid(row, "user_id")?,
        reservation_id: get_uuid(row, "reservation_id")?,
        bet_type: BetType::parse(&bet_type)
            .ok_or_else(|| DbError::Internal(format!("Unknown bet type: {}", bet_type)))?,
        stake: parse_decimal(&get_text(row, "stake")?)?,
        potential_payout: parse_decimal(&get_text(row, "potential_payout")?)?,
        combined_odds: combined_odds.as_deref().map(parse_decimal).transpose()?,
        slip,
        placed_at: get_time(row, "placed_at")?,
    })
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_wallet(&self, account: WalletAccount) -> DbResult<WalletAccount> {
        let cents = to_cents(account.balance)?;
        if cents < 0 {
            return Err(DbError::Constraint("Opening balance cannot be negative".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance_cents, version, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(account.user_id.to_string())
        .bind(cents)
        .bind(account.version)
        .bind(account.created_at.to_rfc3339())
        .bind(account.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            if duplicate {
                DbError::Constraint(format!("Wallet already exists for {}", account.user_id))
            } else {
                internal(e)
            }
        })?;

        Ok(account)
    }

    async fn get_wallet(&self, user_id: Uuid) -> DbResult<WalletAccount> {
        let row = sqlx::query("SELECT * FROM wallets WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| DbError::NotFound("Wallet not found".to_string()))?;

        wallet_from_row(&row)
    }

    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> DbResult<WalletAccount> {
        let cents = to_cents(amount)?;
        if cents <= 0 {
            return Err(DbError::Constraint("Credit must be positive".to_string()));
        }

        // SQLite turns an overflowing integer sum into a REAL, so cap it here
        let credited = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents + ?, version = version + 1, updated_at = ?
            WHERE user_id = ? AND balance_cents <= ?
            RETURNING *
            "#,
        )
        .bind(cents)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .bind(i64::MAX - cents)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match credited {
            Some(row) => wallet_from_row(&row),
            None => {
                // Missing wallet or a balance the credit would overflow
                self.get_wallet(user_id).await?;
                Err(DbError::Constraint(format!(
                    "Credit of {} would overflow the balance",
                    amount
                )))
            }
        }
    }

    async fn reserve(&self, user_id: Uuid, amount: Decimal) -> DbResult<Reservation> {
        let cents = to_cents(amount)?;
        if cents <= 0 {
            return Err(DbError::Constraint("Reservation must be positive".to_string()));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // Check and debit in one statement; there is no separate read
        let debited = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents - ?, version = version + 1, updated_at = ?
            WHERE user_id = ? AND balance_cents >= ?
            RETURNING version
            "#,
        )
        .bind(cents)
        .bind(now.to_rfc3339())
        .bind(user_id.to_string())
        .bind(cents)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        if debited.is_none() {
            let exists = sqlx::query("SELECT 1 FROM wallets WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?
                .is_some();
            tx.rollback().await.map_err(internal)?;

            return Err(if exists {
                DbError::InsufficientFunds {
                    user_id,
                    requested: amount,
                }
            } else {
                DbError::NotFound("Wallet not found".to_string())
            });
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id,
            amount: from_cents(cents),
            status: ReservationStatus::Held,
            created_at: now,
            settled_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO reservations (id, user_id, amount_cents, status, created_at, settled_at)
            VALUES (?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(reservation.id.to_string())
        .bind(user_id.to_string())
        .bind(cents)
        .bind(serialize_reservation_status(reservation.status))
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        Ok(reservation)
    }

    async fn release(&self, reservation_id: Uuid) -> DbResult<bool> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // Only the caller that flips held -> released credits the wallet
        let released = sqlx::query(
            r#"
            UPDATE reservations
            SET status = ?, settled_at = ?
            WHERE id = ? AND status = ?
            RETURNING user_id, amount_cents
            "#,
        )
        .bind(serialize_reservation_status(ReservationStatus::Released))
        .bind(Utc::now().to_rfc3339())
        .bind(reservation_id.to_string())
        .bind(serialize_reservation_status(ReservationStatus::Held))
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        let Some(row) = released else {
            let exists = sqlx::query("SELECT 1 FROM reservations WHERE id = ?")
                .bind(reservation_id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .map_err(internal)?
                .is_some();
            tx.rollback().await.map_err(internal)?;

            return if exists {
                Ok(false)
            } else {
                Err(DbError::NotFound("Reservation not found".to_string()))
            };
        };

        let user_id = get_text(&row, "user_id")?;
        let cents: i64 = row.try_get("amount_cents").map_err(internal)?;

        sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents + ?, version = version + 1, updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(cents)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        Ok(true)
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> DbResult<Reservation> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = ?")
            .bind(reservation_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| DbError::NotFound("Reservation not found".to_string()))?;

        reservation_from_row(&row)
    }

    async fn create_bet(&self, bet: BetRecord) -> DbResult<BetRecord> {
        let slip_json = serde_json::to_string(&bet.slip)
            .map_err(|e| DbError::Internal(format!("Failed to encode slip: {}", e)))?;
        let stake_cents = to_cents(bet.stake)?;

        let mut tx = self.pool.begin().await.map_err(internal)?;

        let committed = sqlx::query(
            r#"
            UPDATE reservations
            SET status = ?, settled_at = ?
            WHERE id = ? AND user_id = ? AND amount_cents = ? AND status = ?
            "#,
        )
        .bind(serialize_reservation_status(ReservationStatus::Committed))
        .bind(bet.placed_at.to_rfc3339())
        .bind(bet.reservation_id.to_string())
        .bind(bet.user_id.to_string())
        .bind(stake_cents)
        .bind(serialize_reservation_status(ReservationStatus::Held))
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        if committed.rows_affected() == 0 {
            tx.rollback().await.map_err(internal)?;
            return Err(DbError::Constraint(format!(
                "Reservation {} is not a held reservation for this bet",
                bet.reservation_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO bets (id, user_id, reservation_id, bet_type, stake, potential_payout, combined_odds, slip, placed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bet.id.to_string())
        .bind(bet.user_id.to_string())
        .bind(bet.reservation_id.to_string())
        .bind(bet.bet_type.as_str())
        .bind(bet.stake.to_string())
        .bind(bet.potential_payout.to_string())
        .bind(bet.combined_odds.map(|o| o.to_string()))
        .bind(slip_json)
        .bind(bet.placed_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        Ok(bet)
    }

    async fn get_bet(&self, id: Uuid) -> DbResult<BetRecord> {
        let row = sqlx::query("SELECT * FROM bets WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?
            .ok_or_else(|| DbError::NotFound("Bet not found".to_string()))?;

        bet_from_row(&row)
    }

    async fn get_bets_for_user(&self, user_id: Uuid) -> DbResult<Vec<BetRecord>> {
        let rows = sqlx::query("SELECT * FROM bets WHERE user_id = ? ORDER BY placed_at DESC")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;

        rows.iter().map(bet_from_row).collect()
    }
}
