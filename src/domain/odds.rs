/// Odds conversion and payout math
///
/// Everything here is pure decimal arithmetic. American odds are whole
/// numbers with `|odds| >= 100`; decimal odds are the total return per
/// unit staked and are always greater than one.
use crate::domain::models::SequentialStep;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use thiserror::Error;

const ONE_HUNDRED: Decimal = dec!(100);

/// Precision used when reporting combined odds
pub const ODDS_DP: u32 = 4;

/// Precision of money amounts
pub const MONEY_DP: u32 = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OddsError {
    #[error("Invalid odds: {0}")]
    InvalidOdds(String),

    #[error("Cannot price an empty set of legs")]
    EmptyLegSet,

    #[error("Stake must be positive, got {0}")]
    NonPositiveStake(Decimal),

    #[error("No teaser price for {legs} legs at {points} points")]
    UnsupportedTeaserCombination { legs: usize, points: Decimal },
}

/// Convert American odds to decimal odds
pub fn to_decimal(american: i32) -> Result<Decimal, OddsError> {
    if american.unsigned_abs() < 100 {
        return Err(OddsError::InvalidOdds(format!(
            "American odds must be at least +/-100, got {}",
            american
        )));
    }

    let american = Decimal::from(american);
    if american.is_sign_positive() {
        Ok(Decimal::ONE + american / ONE_HUNDRED)
    } else {
        Ok(Decimal::ONE - ONE_HUNDRED / american)
    }
}

/// Convert decimal odds back to American odds, rounded to the nearest unit.
/// Even money (2.0) maps to +100.
pub fn to_american(decimal: Decimal) -> Result<i32, OddsError> {
    if decimal <= Decimal::ONE {
        return Err(OddsError::InvalidOdds(format!(
            "Decimal odds must exceed 1, got {}",
            decimal
        )));
    }

    let profit = decimal - Decimal::ONE;
    let american = if decimal >= Decimal::TWO {
        profit * ONE_HUNDRED
    } else {
        -(ONE_HUNDRED / profit)
    };

    american
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .ok_or_else(|| OddsError::InvalidOdds(format!("{} is out of range", decimal)))
}

/// Multiply per-leg decimal odds into one combined figure (unrounded)
pub fn combine_decimal(odds: &[Decimal]) -> Result<Decimal, OddsError> {
    if odds.is_empty() {
        return Err(OddsError::EmptyLegSet);
    }

    odds.iter().try_fold(Decimal::ONE, |acc, &leg| {
        if leg <= Decimal::ONE {
            return Err(OddsError::InvalidOdds(format!(
                "Decimal odds must exceed 1, got {}",
                leg
            )));
        }
        acc.checked_mul(leg)
            .ok_or_else(|| OddsError::InvalidOdds("Combined odds overflow".to_string()))
    })
}

/// Total return for a winning stake, rounded half-up to cents
pub fn payout(stake: Decimal, combined_decimal: Decimal) -> Result<Decimal, OddsError> {
    if stake <= Decimal::ZERO {
        return Err(OddsError::NonPositiveStake(stake));
    }

    stake
        .checked_mul(combined_decimal)
        .map(|amount| amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero))
        .ok_or_else(|| OddsError::InvalidOdds("Payout overflow".to_string()))
}

/// Combined odds as reported to clients
pub fn display_odds(combined_decimal: Decimal) -> Decimal {
    combined_decimal.round_dp_with_strategy(ODDS_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-leg risk for an if-bet chain.
///
/// Each step risks the same stake; step `n + 1` is only live once step `n`
/// has won, so settlement walks this list in order.
pub fn sequential_payout(
    leg_odds: &[Decimal],
    per_leg_stake: Decimal,
) -> Result<Vec<SequentialStep>, OddsError> {
    if leg_odds.is_empty() {
        return Err(OddsError::EmptyLegSet);
    }

    leg_odds
        .iter()
        .enumerate()
        .map(|(leg, &odds)| {
            Ok(SequentialStep {
                leg,
                at_risk: per_leg_stake,
                payout_if_won: payout(per_leg_stake, odds)?,
            })
        })
        .collect()
}

/// Final bankroll of an if-bet chain when every leg wins: the opening
/// stake plus each leg's profit.
pub fn sequential_total(steps: &[SequentialStep]) -> Decimal {
    let opening = steps.first().map(|s| s.at_risk).unwrap_or_default();
    steps
        .iter()
        .fold(opening, |acc, step| acc + (step.payout_if_won - step.at_risk))
}

/// Teaser prices keyed by (leg count, teaser points).
///
/// Teasers are not priced by multiplication; each supported combination
/// has a fixed American price. Built only from validated config.
#[derive(Debug, Clone, Default)]
pub struct TeaserTable {
    prices: BTreeMap<(usize, Decimal), (i32, Decimal)>,
}

impl TeaserTable {
    /// Build the table, rejecting duplicate keys and illegal prices
    pub fn new(
        entries: impl IntoIterator<Item = (usize, Decimal, i32)>,
    ) -> Result<Self, OddsError> {
        let mut prices = BTreeMap::new();
        for (legs, points, american) in entries {
            let points = points.normalize();
            let decimal = to_decimal(american)?;
            if prices.insert((legs, points), (american, decimal)).is_some() {
                return Err(OddsError::InvalidOdds(format!(
                    "Duplicate teaser price for {} legs at {} points",
                    legs, points
                )));
            }
        }
        Ok(Self { prices })
    }

    /// Decimal odds for a teaser of `legs` legs moved `points` points
    pub fn price(&self, legs: usize, points: Decimal) -> Result<Decimal, OddsError> {
        self.prices
            .get(&(legs, points.normalize()))
            .map(|(_, decimal)| *decimal)
            .ok_or(OddsError::UnsupportedTeaserCombination { legs, points })
    }

    pub fn american(&self, legs: usize, points: Decimal) -> Option<i32> {
        self.prices
            .get(&(legs, points.normalize()))
            .map(|(american, _)| *american)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
