/// Bet-type legality rules
///
/// `validate` checks a candidate leg list against the rules for one bet
/// type. Every failure is collected, so the caller sees all problems at
/// once instead of fixing them one resubmission at a time.
use crate::domain::models::{BetType, Leg, MarketType, ValidationResult, Violation, ViolationKind};
use crate::domain::taxonomy;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of legs in an if-bet chain
pub const IF_BET_MAX_LEGS: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct LegalityRuleEngine {
    teaser_leagues: BTreeSet<String>,
}

impl LegalityRuleEngine {
    pub fn new<I, S>(teaser_leagues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            teaser_leagues: teaser_leagues
                .into_iter()
                .map(|league| league.as_ref().trim().to_ascii_uppercase())
                .collect(),
        }
    }

    pub fn validate(&self, bet_type: BetType, legs: &[Leg]) -> ValidationResult {
        let indexed: Vec<(usize, &Leg)> = legs.iter().enumerate().collect();
        self.validate_indexed(bet_type, &indexed, legs.len())
    }

    /// Validate legs that keep their position on the submitted slip.
    ///
    /// `leg_count` is the size of the whole slip, including legs that
    /// could not be quoted and are missing from `legs`. Violations name
    /// legs by their slip position.
    pub fn validate_indexed(
        &self,
        bet_type: BetType,
        legs: &[(usize, &Leg)],
        leg_count: usize,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        if leg_count == 0 {
            result.push(Violation::slip(
                ViolationKind::EmptyLegSet,
                "A bet slip needs at least one leg",
            ));
            return result;
        }

        check_shapes(legs, &mut result);
        check_duplicates(legs, &mut result);

        match bet_type {
            BetType::Straight => {
                check_cardinality(bet_type, leg_count, 1, Some(1), &mut result);
            }
            BetType::Parlay => {
                check_cardinality(bet_type, leg_count, 2, None, &mut result);
                check_distinct_games(bet_type, legs, ViolationKind::SameGameConflict, &mut result);
            }
            BetType::Sgp => {
                check_cardinality(bet_type, leg_count, 2, None, &mut result);
                check_single_game(legs, &mut result);
                check_same_game_conflicts(legs, &mut result);
            }
            BetType::Teaser => {
                check_cardinality(bet_type, leg_count, 2, None, &mut result);
                check_distinct_games(bet_type, legs, ViolationKind::CrossGameViolation, &mut result);
                self.check_teaser_markets(legs, &mut result);
            }
            BetType::IfBet => {
                check_cardinality(bet_type, leg_count, 2, Some(IF_BET_MAX_LEGS), &mut result);
                check_distinct_games(bet_type, legs, ViolationKind::CrossGameViolation, &mut result);
                check_equal_stakes(legs, &mut result);
            }
        }

        result
    }

    /// Teasers only move spreads and totals, and only in listed leagues
    fn check_teaser_markets(&self, legs: &[(usize, &Leg)], result: &mut ValidationResult) {
        for &(idx, leg) in legs {
            let selection = &leg.selection;

            if !matches!(selection.market_type, MarketType::Spread | MarketType::Total) {
                result.push(Violation::new(
                    ViolationKind::MarketNotAllowedForBetType,
                    vec![idx],
                    format!(
                        "Leg {}: {} markets cannot be teased; only spreads and totals",
                        idx + 1,
                        selection.market_type.as_str()
                    ),
                ));
            }

            let league = selection
                .league
                .as_deref()
                .map(|l| l.trim().to_ascii_uppercase());
            match league {
                Some(league) if self.teaser_leagues.contains(&league) => {}
                Some(league) => result.push(Violation::new(
                    ViolationKind::MarketNotAllowedForBetType,
                    vec![idx],
                    format!("Leg {}: league {} is not eligible for teasers", idx + 1, league),
                )),
                None => result.push(Violation::new(
                    ViolationKind::MarketNotAllowedForBetType,
                    vec![idx],
                    format!("Leg {}: teaser legs must name their league", idx + 1),
                )),
            }
        }
    }
}

fn check_shapes(legs: &[(usize, &Leg)], result: &mut ValidationResult) {
    for &(idx, leg) in legs {
        if let Err(reason) = taxonomy::check_shape(&leg.selection) {
            result.push(Violation::new(
                ViolationKind::MalformedSelection,
                vec![idx],
                format!("Leg {}: {}", idx + 1, reason),
            ));
        }
    }
}

/// Every unordered pair of legs, in slip order
fn leg_pairs<'a>(
    legs: &'a [(usize, &'a Leg)],
) -> impl Iterator<Item = ((usize, &'a Leg), (usize, &'a Leg))> + 'a {
    legs.iter()
        .enumerate()
        .flat_map(move |(n, &a)| legs[n + 1..].iter().map(move |&b| (a, b)))
}

fn check_duplicates(legs: &[(usize, &Leg)], result: &mut ValidationResult) {
    for ((i, a), (j, b)) in leg_pairs(legs) {
        if taxonomy::same_selection(&a.selection, &b.selection) {
            result.push(Violation::new(
                ViolationKind::DuplicateSelection,
                vec![i, j],
                format!("Legs {} and {} are the same selection", i + 1, j + 1),
            ));
        }
    }
}

fn check_cardinality(
    bet_type: BetType,
    count: usize,
    min: usize,
    max: Option<usize>,
    result: &mut ValidationResult,
) {
    let expected = match max {
        Some(max) if max == min => format!("exactly {}", min),
        Some(max) => format!("{} to {}", min, max),
        None => format!("at least {}", min),
    };

    if count < min || max.is_some_and(|max| count > max) {
        result.push(Violation::slip(
            ViolationKind::CardinalityViolation,
            format!(
                "A {} needs {} legs, got {}",
                bet_type.as_str(),
                expected,
                count
            ),
        ));
    }
}

/// Leg positions grouped by game, in first-seen order of the game
fn legs_by_game<'a>(legs: &[(usize, &'a Leg)]) -> Vec<(&'a str, Vec<usize>)> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for &(idx, leg) in legs {
        let game = leg.selection.game_id.as_str();
        groups
            .entry(game)
            .or_insert_with(|| {
                order.push(game);
                Vec::new()
            })
            .push(idx);
    }

    order
        .into_iter()
        .filter_map(|game| groups.remove(game).map(|idxs| (game, idxs)))
        .collect()
}

fn check_distinct_games(
    bet_type: BetType,
    legs: &[(usize, &Leg)],
    kind: ViolationKind,
    result: &mut ValidationResult,
) {
    for (game, idxs) in legs_by_game(legs) {
        if idxs.len() > 1 {
            let numbered: Vec<String> = idxs.iter().map(|i| (i + 1).to_string()).collect();
            result.push(Violation::new(
                kind,
                idxs,
                format!(
                    "Legs {} are all from game {}; a {} needs legs from different games",
                    numbered.join(", "),
                    game,
                    bet_type.as_str()
                ),
            ));
        }
    }
}

fn check_single_game(legs: &[(usize, &Leg)], result: &mut ValidationResult) {
    let games = legs_by_game(legs);
    if games.len() > 1 {
        let anchor = games[0].0;
        let stray: Vec<usize> = games[1..]
            .iter()
            .flat_map(|(_, idxs)| idxs.iter().copied())
            .collect();
        let numbered: Vec<String> = stray.iter().map(|i| (i + 1).to_string()).collect();
        result.push(Violation::new(
            ViolationKind::CrossGameViolation,
            stray,
            format!(
                "Legs {} are not from game {}; a same-game parlay stays in one game",
                numbered.join(", "),
                anchor
            ),
        ));
    }
}

/// Pairwise conflicts inside one game. Player props never conflict with
/// team markets.
fn check_same_game_conflicts(legs: &[(usize, &Leg)], result: &mut ValidationResult) {
    for ((i, a), (j, b)) in leg_pairs(legs) {
        let (a, b) = (&a.selection, &b.selection);
        if a.game_id != b.game_id || taxonomy::same_selection(a, b) {
            continue;
        }

        let reason = if taxonomy::shares_team_market(a, b) {
            Some(format!("both back {} in the same team market", a.side))
        } else if taxonomy::opposes_same_total(a, b) {
            Some("take both sides of the same total".to_string())
        } else if taxonomy::opposing_moneylines(a, b) {
            Some("back both teams to win".to_string())
        } else {
            None
        };

        if let Some(reason) = reason {
            result.push(Violation::new(
                ViolationKind::SameGameConflict,
                vec![i, j],
                format!("Legs {} and {} {}", i + 1, j + 1, reason),
            ));
        }
    }
}

fn check_equal_stakes(legs: &[(usize, &Leg)], result: &mut ValidationResult) {
    let stakes: BTreeSet<_> = legs
        .iter()
        .map(|(_, leg)| leg.stake.map(|s| s.normalize()))
        .collect();
    if stakes.len() > 1 {
        result.push(Violation::new(
            ViolationKind::UnequalStakesForIfBet,
            legs.iter().map(|&(idx, _)| idx).collect(),
            "Every leg of an if-bet must risk the same stake",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Selection, Side};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn engine() -> LegalityRuleEngine {
        LegalityRuleEngine::new(["NFL", "nba"])
    }

    fn mock_leg(game: &str, market: MarketType, side: Side, line: Option<Decimal>) -> Leg {
        Leg::new(
            Selection::quote(game, Some("NFL".to_string()), market, side, line, -110).unwrap(),
        )
    }

    fn ml(game: &str, team: &str) -> Leg {
        mock_leg(game, MarketType::Moneyline, Side::Team(team.to_string()), None)
    }

    fn spread(game: &str, team: &str, line: Decimal) -> Leg {
        mock_leg(game, MarketType::Spread, Side::Team(team.to_string()), Some(line))
    }

    fn total(game: &str, side: Side, line: Decimal) -> Leg {
        mock_leg(game, MarketType::Total, side, Some(line))
    }

    fn prop(game: &str, label: &str) -> Leg {
        mock_leg(game, MarketType::Prop, Side::Outcome(label.to_string()), None)
    }

    fn kinds(result: &ValidationResult) -> Vec<ViolationKind> {
        result.errors.iter().map(|v| v.kind).collect()
    }

    #[test]
    fn test_empty_slip() {
        let result = engine().validate(BetType::Parlay, &[]);
        assert_eq!(kinds(&result), vec![ViolationKind::EmptyLegSet]);
    }

    #[test]
    fn test_straight_cardinality() {
        assert!(engine().validate(BetType::Straight, &[ml("g1", "KC")]).is_valid());

        let result = engine().validate(BetType::Straight, &[ml("g1", "KC"), ml("g2", "BUF")]);
        assert_eq!(kinds(&result), vec![ViolationKind::CardinalityViolation]);
    }

    #[test]
    fn test_parlay_rejects_shared_game_for_any_market() {
        let pairs = [
            (ml("g1", "KC"), total("g1", Side::Over, dec!(47.5))),
            (spread("g1", "KC", dec!(-3.5)), prop("g1", "Kelce TD")),
            (total("g1", Side::Over, dec!(47.5)), total("g1", Side::Over, dec!(50.5))),
        ];

        for (a, b) in pairs {
            let result = engine().validate(BetType::Parlay, &[a, b, ml("g2", "BUF")]);
            assert!(result.has(ViolationKind::SameGameConflict));
            let conflict = result
                .errors
                .iter()
                .find(|v| v.kind == ViolationKind::SameGameConflict)
                .unwrap();
            assert_eq!(conflict.legs, vec![0, 1]);
        }
    }

    #[test]
    fn test_parlay_accepts_distinct_games() {
        let legs = [ml("g1", "KC"), spread("g2", "BUF", dec!(2.5)), prop("g3", "x")];
        assert!(engine().validate(BetType::Parlay, &legs).is_valid());

        let result = engine().validate(BetType::Parlay, &[ml("g1", "KC")]);
        assert_eq!(kinds(&result), vec![ViolationKind::CardinalityViolation]);
    }

    #[test]
    fn test_duplicate_selection_always_rejected() {
        for bet_type in [BetType::Straight, BetType::Parlay, BetType::Sgp, BetType::IfBet] {
            let result = engine().validate(bet_type, &[ml("g1", "KC"), ml("g1", "KC")]);
            assert!(
                result.has(ViolationKind::DuplicateSelection),
                "{} accepted a duplicate",
                bet_type
            );
        }
        assert_eq!(
            engine()
                .validate(BetType::Sgp, &[ml("g1", "KC"), ml("g1", "KC")])
                .errors[0]
                .kind,
            ViolationKind::DuplicateSelection
        );
    }

    #[test]
    fn test_sgp_rejects_moneyline_and_spread_on_same_team() {
        let result = engine().validate(BetType::Sgp, &[ml("g1", "KC"), spread("g1", "KC", dec!(-3.5))]);
        assert_eq!(kinds(&result), vec![ViolationKind::SameGameConflict]);
    }

    #[test]
    fn test_sgp_rejects_both_sides_of_total() {
        let result = engine().validate(
            BetType::Sgp,
            &[total("g1", Side::Over, dec!(2.5)), total("g1", Side::Under, dec!(2.5))],
        );
        assert_eq!(kinds(&result), vec![ViolationKind::SameGameConflict]);

        // Different lines are different markets
        let result = engine().validate(
            BetType::Sgp,
            &[total("g1", Side::Over, dec!(2.5)), total("g1", Side::Under, dec!(3.5))],
        );
        assert!(result.is_valid());
    }

    #[test]
    fn test_sgp_rejects_both_moneylines() {
        let result = engine().validate(BetType::Sgp, &[ml("g1", "KC"), ml("g1", "BUF")]);
        assert_eq!(kinds(&result), vec![ViolationKind::SameGameConflict]);
    }

    #[test]
    fn test_sgp_accepts_compatible_markets() {
        let legs = [
            ml("g1", "KC"),
            total("g1", Side::Over, dec!(47.5)),
            prop("g1", "Kelce anytime TD"),
            spread("g1", "BUF", dec!(3.5)),
        ];
        assert!(engine().validate(BetType::Sgp, &legs).is_valid());
    }

    #[test]
    fn test_sgp_must_stay_in_one_game() {
        let result = engine().validate(
            BetType::Sgp,
            &[ml("g1", "KC"), total("g1", Side::Over, dec!(47.5)), ml("g2", "BUF")],
        );
        assert_eq!(kinds(&result), vec![ViolationKind::CrossGameViolation]);
        assert_eq!(result.errors[0].legs, vec![2]);
    }

    #[test]
    fn test_teaser_rejects_moneyline_and_props() {
        let legs = [ml("g1", "KC"), spread("g2", "BUF", dec!(2.5)), prop("g3", "x")];
        let result = engine().validate(BetType::Teaser, &legs);
        let rejected: Vec<&Violation> = result
            .errors
            .iter()
            .filter(|v| v.kind == ViolationKind::MarketNotAllowedForBetType)
            .collect();
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].legs, vec![0]);
        assert_eq!(rejected[1].legs, vec![2]);
    }

    #[test]
    fn test_teaser_league_whitelist() {
        let mut mls = spread("g1", "LAFC", dec!(-0.5));
        mls.selection.league = Some("MLS".to_string());
        let mut unnamed = total("g3", Side::Under, dec!(210.5));
        unnamed.selection.league = None;
        let mut nba = total("g4", Side::Over, dec!(220.5));
        nba.selection.league = Some("NBA".to_string());

        let result = engine().validate(
            BetType::Teaser,
            &[mls, spread("g2", "BUF", dec!(2.5)), unnamed, nba],
        );
        assert_eq!(
            kinds(&result),
            vec![
                ViolationKind::MarketNotAllowedForBetType,
                ViolationKind::MarketNotAllowedForBetType
            ]
        );
    }

    #[test]
    fn test_teaser_needs_distinct_games() {
        let result = engine().validate(
            BetType::Teaser,
            &[spread("g1", "KC", dec!(-3.5)), total("g1", Side::Over, dec!(47.5))],
        );
        assert_eq!(kinds(&result), vec![ViolationKind::CrossGameViolation]);
    }

    #[test]
    fn test_if_bet_rules() {
        let stake = dec!(50);
        let chain = |n: usize| -> Vec<Leg> {
            (0..n)
                .map(|i| {
                    let mut leg = ml(&format!("g{}", i), "HOME");
                    leg.stake = Some(stake);
                    leg
                })
                .collect()
        };

        for n in 2..=4 {
            assert!(engine().validate(BetType::IfBet, &chain(n)).is_valid());
        }
        assert!(engine()
            .validate(BetType::IfBet, &chain(1))
            .has(ViolationKind::CardinalityViolation));
        assert!(engine()
            .validate(BetType::IfBet, &chain(5))
            .has(ViolationKind::CardinalityViolation));

        let mut unequal = chain(3);
        unequal[2].stake = Some(dec!(75));
        let result = engine().validate(BetType::IfBet, &unequal);
        assert_eq!(kinds(&result), vec![ViolationKind::UnequalStakesForIfBet]);

        let mut equal_scales = chain(2);
        equal_scales[1].stake = Some(dec!(50.00));
        assert!(engine().validate(BetType::IfBet, &equal_scales).is_valid());
    }

    #[test]
    fn test_malformed_selection() {
        let bad = mock_leg("g1", MarketType::Total, Side::Team("KC".to_string()), Some(dec!(40)));
        let result = engine().validate(BetType::Straight, &[bad]);
        assert_eq!(kinds(&result), vec![ViolationKind::MalformedSelection]);
    }

    #[test]
    fn test_errors_accumulate() {
        // Wrong market, same game and a duplicate all reported together
        let legs = [ml("g1", "KC"), ml("g1", "KC"), spread("g1", "BUF", dec!(2.5))];
        let result = engine().validate(BetType::Teaser, &legs);
        assert!(result.has(ViolationKind::DuplicateSelection));
        assert!(result.has(ViolationKind::CrossGameViolation));
        assert!(result.has(ViolationKind::MarketNotAllowedForBetType));
    }

    #[test]
    fn test_indexed_legs_keep_slip_positions() {
        // Leg 0 of a three-leg slip could not be quoted
        let (a, b) = (ml("g1", "KC"), ml("g1", "BUF"));
        let legs = [(1, &a), (2, &b)];

        let result = engine().validate_indexed(BetType::Parlay, &legs, 3);

        assert_eq!(kinds(&result), vec![ViolationKind::SameGameConflict]);
        assert_eq!(result.errors[0].legs, vec![1, 2]);
        assert!(result.errors[0].message.starts_with("Legs 2, 3"));
    }

    #[test]
    fn test_validation_is_deterministic() {
        let legs = [ml("g1", "KC"), spread("g1", "KC", dec!(-3.5)), ml("g2", "BUF")];
        let first = engine().validate(BetType::Sgp, &legs);
        let second = engine().validate(BetType::Sgp, &legs);
        assert_eq!(first, second);
    }
}
