use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::odds::{self, OddsError};

/// Wager shapes a slip can take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BetType {
    Straight,
    Parlay,
    Teaser,
    Sgp,
    IfBet,
}

impl BetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetType::Straight => "straight",
            BetType::Parlay => "parlay",
            BetType::Teaser => "teaser",
            BetType::Sgp => "sgp",
            BetType::IfBet => "if-bet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "straight" => Some(BetType::Straight),
            "parlay" => Some(BetType::Parlay),
            "teaser" => Some(BetType::Teaser),
            "sgp" => Some(BetType::Sgp),
            "if-bet" | "ifbet" | "if_bet" => Some(BetType::IfBet),
            _ => None,
        }
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Moneyline,
    Spread,
    Total,
    Prop,
}

impl MarketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::Moneyline => "moneyline",
            MarketType::Spread => "spread",
            MarketType::Total => "total",
            MarketType::Prop => "prop",
        }
    }
}

/// The outcome a selection backs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Side {
    Team(String),
    Over,
    Under,
    Outcome(String),
}

impl Side {
    /// Interpret a raw side label in the context of its market.
    ///
    /// Totals only accept over/under, team markets only accept a team id,
    /// props accept any non-empty outcome label.
    pub fn parse(market_type: MarketType, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let lowered = raw.to_ascii_lowercase();
        let over_under = match lowered.as_str() {
            "over" | "o" => Some(Side::Over),
            "under" | "u" => Some(Side::Under),
            _ => None,
        };

        match market_type {
            MarketType::Total => over_under,
            MarketType::Moneyline | MarketType::Spread => match over_under {
                Some(_) => None,
                None => Some(Side::Team(raw.to_string())),
            },
            MarketType::Prop => Some(Side::Outcome(raw.to_string())),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Team(team) => f.write_str(team),
            Side::Over => f.write_str("over"),
            Side::Under => f.write_str("under"),
            Side::Outcome(label) => f.write_str(label),
        }
    }
}

/// A quoted outcome a user can back.
///
/// Both prices are fixed when the selection is quoted, so `price_decimal`
/// is always the decimal form of `price_american`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub game_id: String,
    pub league: Option<String>,
    pub market_type: MarketType,
    pub side: Side,
    pub line: Option<Decimal>,
    pub price_american: i32,
    pub price_decimal: Decimal,
}

impl Selection {
    pub fn quote(
        game_id: impl Into<String>,
        league: Option<String>,
        market_type: MarketType,
        side: Side,
        line: Option<Decimal>,
        price_american: i32,
    ) -> Result<Self, OddsError> {
        let price_decimal = odds::to_decimal(price_american)?;
        Ok(Self {
            game_id: game_id.into(),
            league,
            market_type,
            side,
            line,
            price_american,
            price_decimal,
        })
    }
}

/// A selection placed on a slip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub selection: Selection,
    /// Per-leg stake, only meaningful for if-bet chains
    pub stake: Option<Decimal>,
}

impl Leg {
    pub fn new(selection: Selection) -> Self {
        Self {
            selection,
            stake: None,
        }
    }

    pub fn with_stake(selection: Selection, stake: Decimal) -> Self {
        Self {
            selection,
            stake: Some(stake),
        }
    }
}

/// Why a slip was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    InvalidOdds,
    EmptyLegSet,
    MalformedSelection,
    DuplicateSelection,
    CardinalityViolation,
    CrossGameViolation,
    SameGameConflict,
    MarketNotAllowedForBetType,
    MissingTeaserPoints,
    UnsupportedTeaserCombination,
    UnequalStakesForIfBet,
    StakeOutOfBounds,
    StakePrecisionExceeded,
    ClientPriceMismatch,
}

/// One rule failure, pointing at the legs that caused it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub legs: Vec<usize>,
    pub message: String,
}

impl Violation {
    pub fn new(kind: ViolationKind, legs: Vec<usize>, message: impl Into<String>) -> Self {
        Self {
            kind,
            legs,
            message: message.into(),
        }
    }

    pub fn slip(kind: ViolationKind, message: impl Into<String>) -> Self {
        Self::new(kind, Vec::new(), message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of validating one slip. Never reused across slip edits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<Violation>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, violation: Violation) {
        self.errors.push(violation);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has(&self, kind: ViolationKind) -> bool {
        self.errors.iter().any(|v| v.kind == kind)
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|v| v.message.clone()).collect()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

/// A leg after pricing. Teaser legs carry their shifted line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLeg {
    pub selection: Selection,
    pub stake: Option<Decimal>,
    pub adjusted_line: Option<Decimal>,
}

/// One link of an if-bet chain. Leg `n + 1` only has money at risk
/// once leg `n` has won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequentialStep {
    pub leg: usize,
    pub at_risk: Decimal,
    pub payout_if_won: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pricing {
    Combined { combined_odds: Decimal },
    Sequential { steps: Vec<SequentialStep> },
}

/// A validated, priced slip.
///
/// Only the builder creates these; there are no setters, so a slip is
/// never altered once it has passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetSlip {
    id: Uuid,
    bet_type: BetType,
    legs: Vec<PricedLeg>,
    stake: Decimal,
    teaser_points: Option<Decimal>,
    pricing: Pricing,
    potential_payout: Decimal,
    warnings: Vec<String>,
    created_at: DateTime<Utc>,
}

impl BetSlip {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bet_type: BetType,
        legs: Vec<PricedLeg>,
        stake: Decimal,
        teaser_points: Option<Decimal>,
        pricing: Pricing,
        potential_payout: Decimal,
        warnings: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bet_type,
            legs,
            stake,
            teaser_points,
            pricing,
            potential_payout,
            warnings,
            created_at: Utc::now(),
        }
    }

    /// Warnings raised after pricing, such as ignored client claims
    pub(crate) fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn bet_type(&self) -> BetType {
        self.bet_type
    }

    pub fn legs(&self) -> &[PricedLeg] {
        &self.legs
    }

    /// Amount reserved from the wallet. For if-bets this is the common
    /// per-leg stake, since only the first leg is at risk up front.
    pub fn stake(&self) -> Decimal {
        self.stake
    }

    pub fn teaser_points(&self) -> Option<Decimal> {
        self.teaser_points
    }

    pub fn pricing(&self) -> &Pricing {
        &self.pricing
    }

    /// Rounded combined odds, absent for sequential (if-bet) pricing
    pub fn combined_odds(&self) -> Option<Decimal> {
        match &self.pricing {
            Pricing::Combined { combined_odds } => Some(*combined_odds),
            Pricing::Sequential { .. } => None,
        }
    }

    pub fn potential_payout(&self) -> Decimal {
        self.potential_payout
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ===== Inbound request =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegRequest {
    pub game_id: String,
    #[serde(default)]
    pub league: Option<String>,
    pub market_type: MarketType,
    pub side: String,
    #[serde(default)]
    pub line: Option<Decimal>,
    pub price_american: i32,
    #[serde(default)]
    pub stake: Option<Decimal>,
}

/// A client-submitted slip. Claimed figures are only compared against
/// the recomputed ones, never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlipRequest {
    pub bet_type: BetType,
    pub legs: Vec<LegRequest>,
    pub stake: Decimal,
    #[serde(default)]
    pub teaser_points: Option<Decimal>,
    #[serde(default)]
    pub claimed_odds: Option<Decimal>,
    #[serde(default)]
    pub claimed_payout: Option<Decimal>,
}

// ===== Wallet and persisted bets =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: Uuid,
    pub balance: Decimal,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Held,      // Stake taken from balance, bet not yet written
    Committed, // Bet record written
    Released,  // Stake returned to balance
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// An accepted bet as handed to storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reservation_id: Uuid,
    pub bet_type: BetType,
    pub stake: Decimal,
    pub potential_payout: Decimal,
    pub combined_odds: Option<Decimal>,
    pub slip: BetSlip,
    pub placed_at: DateTime<Utc>,
}

impl BetRecord {
    pub fn from_slip(user_id: Uuid, reservation_id: Uuid, slip: BetSlip) -> Self {
        Self {
            id: slip.id(),
            user_id,
            reservation_id,
            bet_type: slip.bet_type(),
            stake: slip.stake(),
            potential_payout: slip.potential_payout(),
            combined_odds: slip.combined_odds(),
            placed_at: Utc::now(),
            slip,
        }
    }
}
