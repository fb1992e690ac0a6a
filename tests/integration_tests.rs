#![cfg(feature = "sqlite")]

/// Integration tests for the slipway engine
/// These run full placement workflows against SQLite
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use slipway::db::{Database, DbError, DbResult, SqliteDatabase};
use slipway::domain::models::{
    BetRecord, BetType, LegRequest, MarketType, Reservation, ReservationStatus, SlipRequest,
    ViolationKind, WalletAccount,
};
use slipway::service::{ServiceError, SlipwayService};
use slipway::EngineConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Helper to create an in-memory test database
async fn setup_test_db() -> SlipwayService<SqliteDatabase> {
    let db = SqliteDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    service_over(db)
}

fn service_over<D: Database + 'static>(db: D) -> SlipwayService<D> {
    let builder = EngineConfig::default().slip_builder().unwrap();
    SlipwayService::new(Arc::new(db), builder)
}

fn moneyline(game: &str, team: &str, price: i32) -> LegRequest {
    LegRequest {
        game_id: game.to_string(),
        league: Some("NFL".to_string()),
        market_type: MarketType::Moneyline,
        side: team.to_string(),
        line: None,
        price_american: price,
        stake: None,
    }
}

fn slip(bet_type: BetType, legs: Vec<LegRequest>, stake: Decimal) -> SlipRequest {
    SlipRequest {
        bet_type,
        legs,
        stake,
        teaser_points: None,
        claimed_odds: None,
        claimed_payout: None,
    }
}

#[tokio::test]
async fn test_full_placement_flow() {
    let service = setup_test_db().await;

    // 1. Open a wallet
    let wallet = service.open_wallet(None, dec!(500)).await.unwrap();
    assert_eq!(wallet.balance, dec!(500));
    assert_eq!(wallet.version, 0);

    // 2. Place a three leg parlay
    let request = slip(
        BetType::Parlay,
        vec![
            moneyline("g1", "KC", -110),
            moneyline("g2", "BUF", 110),
            moneyline("g3", "DAL", -125),
        ],
        dec!(50),
    );
    let placed = service.place_bet(wallet.user_id, request).await.unwrap();

    assert_eq!(placed.bet.stake, dec!(50));
    assert_eq!(placed.bet.combined_odds, Some(dec!(7.2164)));
    assert_eq!(placed.bet.potential_payout, dec!(360.82));

    // 3. Stake left the wallet
    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(450));
    assert_eq!(wallet.version, 1);

    // 4. Reservation was committed with the bet
    let reservation = service.get_reservation(placed.reservation_id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Committed);
    assert_eq!(reservation.amount, dec!(50));
    assert!(reservation.settled_at.is_some());

    // 5. Bet is stored and readable
    let stored = service.get_bet(placed.bet.id).await.unwrap();
    assert_eq!(stored.reservation_id, placed.reservation_id);
    assert_eq!(stored.slip.legs().len(), 3);
    assert_eq!(stored.slip.potential_payout(), dec!(360.82));

    let bets = service.get_bets_for_user(wallet.user_id).await.unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].id, placed.bet.id);
}

#[tokio::test]
async fn test_if_bet_reserves_first_leg_risk() {
    let service = setup_test_db().await;
    let wallet = service.open_wallet(None, dec!(300)).await.unwrap();

    let request = slip(
        BetType::IfBet,
        vec![moneyline("g1", "KC", -110), moneyline("g2", "BUF", 150)],
        dec!(100),
    );
    let placed = service.place_bet(wallet.user_id, request).await.unwrap();

    assert_eq!(placed.bet.combined_odds, None);
    assert_eq!(placed.bet.potential_payout, dec!(340.91));

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(200));
}

#[tokio::test]
async fn test_rejected_slip_leaves_balance_untouched() {
    let service = setup_test_db().await;
    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();

    // Same game moneyline and total on a plain parlay
    let mut total = moneyline("g1", "over", -110);
    total.market_type = MarketType::Total;
    total.line = Some(dec!(47.5));
    let request = slip(
        BetType::Parlay,
        vec![moneyline("g1", "KC", -110), total],
        dec!(20),
    );

    let err = service.place_bet(wallet.user_id, request).await.unwrap_err();
    match err {
        ServiceError::Rejected(result) => {
            assert!(result.has(ViolationKind::SameGameConflict));
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));
    assert_eq!(wallet.version, 0);
    assert!(service
        .get_bets_for_user(wallet.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_tampered_payout_is_rejected() {
    let service = setup_test_db().await;
    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();

    let mut request = slip(BetType::Straight, vec![moneyline("g1", "KC", -150)], dec!(10));
    request.claimed_payout = Some(dec!(50));

    let err = service.place_bet(wallet.user_id, request).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Rejected(ref result) if result.has(ViolationKind::ClientPriceMismatch)
    ));
    assert_eq!(
        service.get_wallet(wallet.user_id).await.unwrap().balance,
        dec!(100)
    );
}

#[tokio::test]
async fn test_insufficient_funds() {
    let service = setup_test_db().await;
    let wallet = service.open_wallet(None, dec!(25)).await.unwrap();

    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(30));
    let err = service.place_bet(wallet.user_id, request).await.unwrap_err();

    match err {
        ServiceError::InsufficientFunds { user_id, requested } => {
            assert_eq!(user_id, wallet.user_id);
            assert_eq!(requested, dec!(30));
        }
        other => panic!("expected insufficient funds, got {:?}", other),
    }

    assert_eq!(
        service.get_wallet(wallet.user_id).await.unwrap().balance,
        dec!(25)
    );
}

#[tokio::test]
async fn test_unknown_wallet_cannot_bet() {
    let service = setup_test_db().await;

    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(10));
    let err = service.place_bet(Uuid::new_v4(), request).await.unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_reservations_never_overdraw() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("ledger.db").display());
    let db = SqliteDatabase::new(&url).await.unwrap();
    db.run_migrations().await.unwrap();
    let db = Arc::new(db);

    let wallet = service_over(db.as_ref().clone())
        .open_wallet(None, dec!(100))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let db = Arc::clone(&db);
        let user_id = wallet.user_id;
        handles.push(tokio::spawn(async move {
            db.reserve(user_id, dec!(60)).await
        }));
    }

    let mut succeeded = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(DbError::InsufficientFunds { .. }) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(rejected, 1);
    assert_eq!(db.get_wallet(wallet.user_id).await.unwrap().balance, dec!(40));
}

#[tokio::test]
async fn test_committed_reservation_is_not_released() {
    let service = setup_test_db().await;
    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();

    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(40));
    let placed = service.place_bet(wallet.user_id, request).await.unwrap();

    // Committed reservations are never released
    assert!(!service
        .release_reservation(placed.reservation_id)
        .await
        .unwrap());
    assert_eq!(
        service.get_wallet(wallet.user_id).await.unwrap().balance,
        dec!(60)
    );

    let err = service
        .release_reservation(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn test_held_reservation_released_once() {
    let db = SqliteDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    let service = service_over(db.clone());

    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();
    let reservation = db.reserve(wallet.user_id, dec!(30)).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Held);
    assert_eq!(
        service.get_wallet(wallet.user_id).await.unwrap().balance,
        dec!(70)
    );

    assert!(service.release_reservation(reservation.id).await.unwrap());
    assert!(!service.release_reservation(reservation.id).await.unwrap());

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));

    let reservation = service.get_reservation(reservation.id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Released);
}

/// Storage whose bet writes are slow, and optionally always fail
struct FlakyBets<D> {
    inner: D,
    delay: Duration,
    fail: bool,
}

impl<D> FlakyBets<D> {
    fn failing(inner: D) -> Self {
        Self {
            inner,
            delay: Duration::ZERO,
            fail: true,
        }
    }

    fn slow(inner: D, delay: Duration, fail: bool) -> Self {
        Self { inner, delay, fail }
    }
}

#[async_trait]
impl<D: Database> Database for FlakyBets<D> {
    async fn create_wallet(&self, account: WalletAccount) -> DbResult<WalletAccount> {
        self.inner.create_wallet(account).await
    }

    async fn get_wallet(&self, user_id: Uuid) -> DbResult<WalletAccount> {
        self.inner.get_wallet(user_id).await
    }

    async fn credit_wallet(&self, user_id: Uuid, amount: Decimal) -> DbResult<WalletAccount> {
        self.inner.credit_wallet(user_id, amount).await
    }

    async fn reserve(&self, user_id: Uuid, amount: Decimal) -> DbResult<Reservation> {
        self.inner.reserve(user_id, amount).await
    }

    async fn release(&self, reservation_id: Uuid) -> DbResult<bool> {
        self.inner.release(reservation_id).await
    }

    async fn get_reservation(&self, reservation_id: Uuid) -> DbResult<Reservation> {
        self.inner.get_reservation(reservation_id).await
    }

    async fn create_bet(&self, bet: BetRecord) -> DbResult<BetRecord> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(DbError::Internal("disk full".to_string()));
        }
        self.inner.create_bet(bet).await
    }

    async fn get_bet(&self, id: Uuid) -> DbResult<BetRecord> {
        self.inner.get_bet(id).await
    }

    async fn get_bets_for_user(&self, user_id: Uuid) -> DbResult<Vec<BetRecord>> {
        self.inner.get_bets_for_user(user_id).await
    }
}

#[tokio::test]
async fn test_failed_bet_write_returns_stake() {
    let db = SqliteDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    let service = service_over(FlakyBets::failing(db));

    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();
    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(40));

    let err = service.place_bet(wallet.user_id, request).await.unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));
    // Reserve then release each bump the version
    assert_eq!(wallet.version, 2);
    assert!(service
        .get_bets_for_user(wallet.user_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_abandoned_placement_still_records_bet() {
    let db = SqliteDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    let service = service_over(FlakyBets::slow(db, Duration::from_millis(200), false));

    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();
    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(40));

    // Caller gives up while the bet write is in flight
    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        service.place_bet(wallet.user_id, request),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    let bets = service.get_bets_for_user(wallet.user_id).await.unwrap();
    assert_eq!(bets.len(), 1);
    let reservation = service.get_reservation(bets[0].reservation_id).await.unwrap();
    assert_eq!(reservation.status, ReservationStatus::Committed);
    assert_eq!(
        service.get_wallet(wallet.user_id).await.unwrap().balance,
        dec!(60)
    );
}

#[tokio::test]
async fn test_abandoned_failed_placement_returns_stake() {
    let db = SqliteDatabase::new("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    let service = service_over(FlakyBets::slow(db, Duration::from_millis(200), true));

    let wallet = service.open_wallet(None, dec!(100)).await.unwrap();
    let request = slip(BetType::Straight, vec![moneyline("g1", "KC", -110)], dec!(40));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        service.place_bet(wallet.user_id, request),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(100));
    assert_eq!(wallet.version, 2);
}

#[tokio::test]
async fn test_out_of_range_amounts_are_rejected() {
    let service = setup_test_db().await;

    assert!(matches!(
        service.open_wallet(None, Decimal::MAX).await,
        Err(ServiceError::InvalidRequest(_))
    ));

    let wallet = service.open_wallet(None, dec!(10)).await.unwrap();
    assert!(matches!(
        service.deposit(wallet.user_id, Decimal::MAX).await,
        Err(ServiceError::InvalidRequest(_))
    ));

    // Representable in cents, but the sum would not be
    let huge = dec!(90000000000000000);
    service.deposit(wallet.user_id, huge).await.unwrap();
    assert!(matches!(
        service.deposit(wallet.user_id, huge).await,
        Err(ServiceError::InvalidRequest(_))
    ));

    let wallet = service.get_wallet(wallet.user_id).await.unwrap();
    assert_eq!(wallet.balance, huge + dec!(10));
}

#[tokio::test]
async fn test_deposit_and_wallet_rules() {
    let service = setup_test_db().await;
    let user_id = Uuid::new_v4();

    let wallet = service.open_wallet(Some(user_id), dec!(10)).await.unwrap();
    assert_eq!(wallet.user_id, user_id);

    let wallet = service.deposit(user_id, dec!(15.50)).await.unwrap();
    assert_eq!(wallet.balance, dec!(25.50));
    assert_eq!(wallet.version, 1);

    assert!(matches!(
        service.deposit(user_id, dec!(0)).await,
        Err(ServiceError::InvalidRequest(_))
    ));
    assert!(matches!(
        service.deposit(Uuid::new_v4(), dec!(5)).await,
        Err(ServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.open_wallet(Some(user_id), dec!(10)).await,
        Err(ServiceError::InvalidRequest(_))
    ));
    assert!(matches!(
        service.open_wallet(None, dec!(-1)).await,
        Err(ServiceError::InvalidRequest(_))
    ));
}
