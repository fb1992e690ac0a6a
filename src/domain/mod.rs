pub mod models;
pub mod odds;
pub mod rules;
pub mod slip;
pub mod taxonomy;

pub use models::{BetSlip, BetType, Leg, MarketType, Selection, Side, ValidationResult};
pub use rules::LegalityRuleEngine;
pub use slip::BetSlipBuilder;
