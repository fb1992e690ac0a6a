/// Bet slip assembly: validate, price and freeze a candidate slip
use crate::config::StakeLimits;
use crate::domain::models::{
    BetSlip, BetType, Leg, LegRequest, PricedLeg, Pricing, Selection, SlipRequest, Side,
    ValidationResult, Violation, ViolationKind,
};
use crate::domain::odds::{self, OddsError, TeaserTable, MONEY_DP};
use crate::domain::rules::LegalityRuleEngine;
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub struct BetSlipBuilder {
    rules: LegalityRuleEngine,
    stake_limits: StakeLimits,
    teaser_table: TeaserTable,
    payout_tolerance: Decimal,
}

impl BetSlipBuilder {
    pub fn new(
        rules: LegalityRuleEngine,
        stake_limits: StakeLimits,
        teaser_table: TeaserTable,
        payout_tolerance: Decimal,
    ) -> Self {
        Self {
            rules,
            stake_limits,
            teaser_table,
            payout_tolerance,
        }
    }

    /// Validate and price a slip.
    ///
    /// Rule and stake problems are reported together. Pricing only runs
    /// once both pass.
    pub fn build(
        &self,
        bet_type: BetType,
        legs: Vec<Leg>,
        stake: Decimal,
        teaser_points: Option<Decimal>,
    ) -> Result<BetSlip, ValidationResult> {
        let terms = SlipTerms::normalize(bet_type, legs, stake, teaser_points);

        let indexed: Vec<(usize, &Leg)> = terms.legs.iter().enumerate().collect();
        let mut result = self.check_terms(bet_type, &indexed, terms.legs.len(), &terms);
        if !result.is_valid() {
            result.warnings.extend(terms.warnings);
            return Err(result);
        }

        let SlipTerms {
            legs,
            risk,
            teaser_points,
            warnings,
        } = terms;

        let (pricing, potential_payout) = self
            .price(bet_type, &legs, risk, teaser_points)
            .map_err(|e| {
                let mut failed = ValidationResult::default();
                failed.push(odds_violation(e));
                failed.warnings.extend(warnings.iter().cloned());
                failed
            })?;

        let priced_legs = legs
            .into_iter()
            .map(|leg| {
                let adjusted_line = teaser_points
                    .and_then(|points| teased_line(&leg.selection, points));
                PricedLeg {
                    selection: leg.selection,
                    stake: leg.stake,
                    adjusted_line,
                }
            })
            .collect();

        Ok(BetSlip::new(
            bet_type,
            priced_legs,
            risk,
            teaser_points,
            pricing,
            potential_payout,
            warnings,
        ))
    }

    /// Build from a client request, then compare any figures the client
    /// claimed against the recomputed ones.
    ///
    /// Legs that cannot be quoted are reported alongside every rule and
    /// stake problem in the legs that could.
    pub fn build_request(&self, request: &SlipRequest) -> Result<BetSlip, ValidationResult> {
        let mut rejected = ValidationResult::default();
        let mut positions = Vec::with_capacity(request.legs.len());
        let mut legs = Vec::with_capacity(request.legs.len());

        for (idx, leg) in request.legs.iter().enumerate() {
            match quote_leg(idx, leg) {
                Ok(leg) => {
                    positions.push(idx);
                    legs.push(leg);
                }
                Err(violation) => rejected.push(violation),
            }
        }

        if !rejected.is_valid() {
            let terms =
                SlipTerms::normalize(request.bet_type, legs, request.stake, request.teaser_points);
            let indexed: Vec<(usize, &Leg)> =
                positions.iter().copied().zip(terms.legs.iter()).collect();
            rejected.merge(self.check_terms(
                request.bet_type,
                &indexed,
                request.legs.len(),
                &terms,
            ));
            rejected.errors.sort_by_key(|v| v.legs.first().copied().unwrap_or(usize::MAX));
            rejected.warnings.extend(terms.warnings);
            return Err(rejected);
        }

        let slip = self.build(request.bet_type, legs, request.stake, request.teaser_points)?;
        match self.verify_claims(&slip, request.claimed_odds, request.claimed_payout) {
            Ok(warnings) => Ok(slip.with_warnings(warnings)),
            Err(mut result) => {
                result.warnings.extend(slip.warnings().iter().cloned());
                Err(result)
            }
        }
    }

    /// Reject a slip whose client-side figures drift from ours.
    ///
    /// Claims that cannot be compared are returned as warnings.
    pub fn verify_claims(
        &self,
        slip: &BetSlip,
        claimed_odds: Option<Decimal>,
        claimed_payout: Option<Decimal>,
    ) -> Result<Vec<String>, ValidationResult> {
        let mut result = ValidationResult::default();

        if let Some(claimed) = claimed_payout {
            if self.drifts(claimed, slip.potential_payout()) {
                result.push(Violation::slip(
                    ViolationKind::ClientPriceMismatch,
                    format!(
                        "Claimed payout {} does not match the computed payout {}",
                        claimed,
                        slip.potential_payout()
                    ),
                ));
            }
        }

        if let Some(claimed) = claimed_odds {
            match slip.combined_odds() {
                Some(actual) if self.drifts(claimed, actual) => {
                    result.push(Violation::slip(
                        ViolationKind::ClientPriceMismatch,
                        format!(
                            "Claimed odds {} do not match the computed odds {}",
                            claimed, actual
                        ),
                    ));
                }
                Some(_) => {}
                None => result.warn("If-bets have no combined odds; claimed odds were ignored"),
            }
        }

        if result.is_valid() {
            Ok(result.warnings)
        } else {
            Err(result)
        }
    }

    pub fn check_stake(&self, stake: Decimal) -> ValidationResult {
        let mut result = ValidationResult::default();
        let StakeLimits { min, max } = &self.stake_limits;

        if stake <= Decimal::ZERO || stake < *min || stake > *max {
            result.push(Violation::slip(
                ViolationKind::StakeOutOfBounds,
                format!("Stake {} must be between {} and {}", stake, min, max),
            ));
        }
        if stake.normalize().scale() > MONEY_DP {
            result.push(Violation::slip(
                ViolationKind::StakePrecisionExceeded,
                format!("Stake {} has more than {} decimal places", stake, MONEY_DP),
            ));
        }

        result
    }

    /// A claim too far from the computed figure to represent counts as drift
    fn drifts(&self, claimed: Decimal, actual: Decimal) -> bool {
        claimed
            .checked_sub(actual)
            .map_or(true, |diff| diff.abs() > self.payout_tolerance)
    }

    /// Rules, teaser terms and stake limits, merged into one result
    fn check_terms(
        &self,
        bet_type: BetType,
        legs: &[(usize, &Leg)],
        leg_count: usize,
        terms: &SlipTerms,
    ) -> ValidationResult {
        let mut result = self.rules.validate_indexed(bet_type, legs, leg_count);
        if bet_type == BetType::Teaser {
            self.check_teaser_terms(leg_count, terms.teaser_points, &mut result);
        }
        result.merge(self.check_stake(terms.risk));
        result
    }

    fn check_teaser_terms(
        &self,
        leg_count: usize,
        teaser_points: Option<Decimal>,
        result: &mut ValidationResult,
    ) {
        match teaser_points {
            None => result.push(Violation::slip(
                ViolationKind::MissingTeaserPoints,
                "A teaser needs the number of points to move each line",
            )),
            Some(points) if leg_count >= 2 => {
                if let Err(e) = self.teaser_table.price(leg_count, points) {
                    result.push(odds_violation(e));
                }
            }
            // Cardinality is already reported
            Some(_) => {}
        }
    }

    fn price(
        &self,
        bet_type: BetType,
        legs: &[Leg],
        stake: Decimal,
        teaser_points: Option<Decimal>,
    ) -> Result<(Pricing, Decimal), OddsError> {
        let leg_odds: Vec<Decimal> = legs.iter().map(|leg| leg.selection.price_decimal).collect();

        match bet_type {
            BetType::Straight | BetType::Parlay | BetType::Sgp => {
                let combined = odds::combine_decimal(&leg_odds)?;
                Ok((
                    Pricing::Combined {
                        combined_odds: odds::display_odds(combined),
                    },
                    odds::payout(stake, combined)?,
                ))
            }
            BetType::Teaser => {
                let points = teaser_points.ok_or_else(|| {
                    OddsError::InvalidOdds("teaser priced without points".to_string())
                })?;
                let combined = self.teaser_table.price(legs.len(), points)?;
                Ok((
                    Pricing::Combined {
                        combined_odds: odds::display_odds(combined),
                    },
                    odds::payout(stake, combined)?,
                ))
            }
            BetType::IfBet => {
                let steps = odds::sequential_payout(&leg_odds, stake)?;
                let total = odds::sequential_total(&steps);
                Ok((Pricing::Sequential { steps }, total))
            }
        }
    }
}

/// Legs, stake and teaser points after bet-type specific clean-up
struct SlipTerms {
    legs: Vec<Leg>,
    risk: Decimal,
    teaser_points: Option<Decimal>,
    warnings: Vec<String>,
}

impl SlipTerms {
    fn normalize(
        bet_type: BetType,
        mut legs: Vec<Leg>,
        stake: Decimal,
        teaser_points: Option<Decimal>,
    ) -> Self {
        let mut warnings = Vec::new();

        if bet_type == BetType::IfBet {
            for leg in legs.iter_mut() {
                leg.stake.get_or_insert(stake);
            }
        } else if legs.iter().any(|leg| leg.stake.is_some()) {
            warnings.push(format!(
                "Per-leg stakes only apply to if-bets and were ignored for this {}",
                bet_type
            ));
            for leg in legs.iter_mut() {
                leg.stake = None;
            }
        }

        let teaser_points = match (bet_type, teaser_points) {
            (BetType::Teaser, points) => points,
            (_, Some(_)) => {
                warnings.push(format!(
                    "Teaser points only apply to teasers and were ignored for this {}",
                    bet_type
                ));
                None
            }
            (_, None) => None,
        };

        // If-bets risk the common per-leg stake
        let risk = match bet_type {
            BetType::IfBet => legs.first().and_then(|leg| leg.stake).unwrap_or(stake),
            _ => stake,
        };

        Self {
            legs,
            risk,
            teaser_points,
            warnings,
        }
    }
}

fn quote_leg(idx: usize, leg: &LegRequest) -> Result<Leg, Violation> {
    let side = Side::parse(leg.market_type, &leg.side).ok_or_else(|| {
        Violation::new(
            ViolationKind::MalformedSelection,
            vec![idx],
            format!(
                "Leg {}: side '{}' does not fit a {} market",
                idx + 1,
                leg.side,
                leg.market_type.as_str()
            ),
        )
    })?;

    let selection = Selection::quote(
        leg.game_id.clone(),
        leg.league.clone(),
        leg.market_type,
        side,
        leg.line,
        leg.price_american,
    )
    .map_err(|e| Violation::new(ViolationKind::InvalidOdds, vec![idx], format!("Leg {}: {}", idx + 1, e)))?;

    Ok(Leg {
        selection,
        stake: leg.stake,
    })
}

/// Line after moving it `points` in the bettor's favour
fn teased_line(selection: &Selection, points: Decimal) -> Option<Decimal> {
    let line = selection.line?;
    match selection.side {
        Side::Over => line.checked_sub(points),
        Side::Under | Side::Team(_) => line.checked_add(points),
        Side::Outcome(_) => None,
    }
}

fn odds_violation(error: OddsError) -> Violation {
    let kind = match &error {
        OddsError::InvalidOdds(_) => ViolationKind::InvalidOdds,
        OddsError::EmptyLegSet => ViolationKind::EmptyLegSet,
        OddsError::NonPositiveStake(_) => ViolationKind::StakeOutOfBounds,
        OddsError::UnsupportedTeaserCombination { .. } => {
            ViolationKind::UnsupportedTeaserCombination
        }
    };
    Violation::slip(kind, error.to_string())
}
