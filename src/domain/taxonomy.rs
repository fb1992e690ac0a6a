/// Market classification used to detect conflicting selections
use crate::domain::models::{MarketType, Selection, Side};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketCategory {
    TeamMoneyline,
    TeamSpread,
    Total,
    PlayerProp,
}

impl MarketCategory {
    pub fn is_team_market(&self) -> bool {
        matches!(self, MarketCategory::TeamMoneyline | MarketCategory::TeamSpread)
    }
}

/// Identity of the market a selection belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MarketKey {
    pub game_id: String,
    pub team_id: Option<String>,
    pub category: MarketCategory,
    /// Which line of a spread/total/prop. Over 2.5 and Over 3.5 are
    /// different markets; Over 2.5 and Under 2.5 are the same one.
    pub line_key: Option<Decimal>,
}

pub fn classify(selection: &Selection) -> MarketKey {
    let category = match selection.market_type {
        MarketType::Moneyline => MarketCategory::TeamMoneyline,
        MarketType::Spread => MarketCategory::TeamSpread,
        MarketType::Total => MarketCategory::Total,
        MarketType::Prop => MarketCategory::PlayerProp,
    };

    let team_id = match (&selection.side, category.is_team_market()) {
        (Side::Team(team), true) => Some(team.clone()),
        _ => None,
    };

    MarketKey {
        game_id: selection.game_id.clone(),
        team_id,
        category,
        line_key: selection.line.map(|line| line.normalize()),
    }
}

/// Same game, same team, both moneyline or spread
pub fn shares_team_market(a: &Selection, b: &Selection) -> bool {
    let (ka, kb) = (classify(a), classify(b));
    ka.game_id == kb.game_id
        && ka.category.is_team_market()
        && kb.category.is_team_market()
        && ka.team_id.is_some()
        && ka.team_id == kb.team_id
}

/// Over and under of the same total line in the same game
pub fn opposes_same_total(a: &Selection, b: &Selection) -> bool {
    let (ka, kb) = (classify(a), classify(b));
    ka.game_id == kb.game_id
        && ka.category == MarketCategory::Total
        && kb.category == MarketCategory::Total
        && ka.line_key == kb.line_key
        && matches!(
            (&a.side, &b.side),
            (Side::Over, Side::Under) | (Side::Under, Side::Over)
        )
}

/// Moneylines on both teams of one game; at most one can win
pub fn opposing_moneylines(a: &Selection, b: &Selection) -> bool {
    let (ka, kb) = (classify(a), classify(b));
    ka.game_id == kb.game_id
        && ka.category == MarketCategory::TeamMoneyline
        && kb.category == MarketCategory::TeamMoneyline
        && ka.team_id != kb.team_id
}

/// Same game, market, side and line. Price does not matter.
pub fn same_selection(a: &Selection, b: &Selection) -> bool {
    a.game_id == b.game_id
        && a.market_type == b.market_type
        && a.side == b.side
        && a.line.map(|l| l.normalize()) == b.line.map(|l| l.normalize())
}

/// Check that side and line fit the market type
pub fn check_shape(selection: &Selection) -> Result<(), String> {
    let side_fits = match selection.market_type {
        MarketType::Moneyline | MarketType::Spread => matches!(selection.side, Side::Team(_)),
        MarketType::Total => matches!(selection.side, Side::Over | Side::Under),
        MarketType::Prop => true,
    };
    if !side_fits {
        return Err(format!(
            "side '{}' does not fit a {} market",
            selection.side,
            selection.market_type.as_str()
        ));
    }

    match (selection.market_type, selection.line) {
        (MarketType::Spread | MarketType::Total, None) => Err(format!(
            "a {} selection needs a line",
            selection.market_type.as_str()
        )),
        (MarketType::Moneyline, Some(_)) => Err("a moneyline selection has no line".to_string()),
        _ => Ok(()),
    }
}
