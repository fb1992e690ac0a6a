/// Engine configuration
///
/// Stake limits, tamper tolerance and teaser terms are product decisions,
/// so they live in a TOML file rather than in code. Every field has a
/// default, and an absent file means "all defaults".
use crate::domain::odds::{OddsError, TeaserTable};
use crate::domain::rules::LegalityRuleEngine;
use crate::domain::slip::BetSlipBuilder;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct StakeLimits {
    #[serde(default = "default_min_stake")]
    pub min: Decimal,
    #[serde(default = "default_max_stake")]
    pub max: Decimal,
}

fn default_min_stake() -> Decimal {
    dec!(1.00)
}

fn default_max_stake() -> Decimal {
    dec!(10000.00)
}

impl Default for StakeLimits {
    fn default() -> Self {
        Self {
            min: default_min_stake(),
            max: default_max_stake(),
        }
    }
}

/// One row of the teaser price table
#[derive(Debug, Clone, Deserialize)]
pub struct TeaserPrice {
    pub legs: usize,
    pub points: Decimal,
    pub american: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeaserConfig {
    #[serde(default = "default_teaser_leagues")]
    pub leagues: Vec<String>,
    #[serde(default = "default_teaser_prices")]
    pub prices: Vec<TeaserPrice>,
}

fn default_teaser_leagues() -> Vec<String> {
    ["NFL", "NCAAF", "NBA", "NCAAB"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_teaser_prices() -> Vec<TeaserPrice> {
    let row = |legs, points, american| TeaserPrice {
        legs,
        points,
        american,
    };
    vec![
        row(2, dec!(6), -110),
        row(2, dec!(6.5), -120),
        row(2, dec!(7), -130),
        row(3, dec!(6), 180),
        row(3, dec!(6.5), 160),
        row(3, dec!(7), 140),
        row(4, dec!(6), 300),
        row(4, dec!(6.5), 250),
        row(4, dec!(7), 200),
    ]
}

impl Default for TeaserConfig {
    fn default() -> Self {
        Self {
            leagues: default_teaser_leagues(),
            prices: default_teaser_prices(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub stake: StakeLimits,
    /// Largest allowed gap between a client's claimed figure and ours
    #[serde(default = "default_payout_tolerance")]
    pub payout_tolerance: Decimal,
    #[serde(default)]
    pub teaser: TeaserConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_payout_tolerance() -> Decimal {
    dec!(0.01)
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stake: StakeLimits::default(),
            payout_tolerance: default_payout_tolerance(),
            teaser: TeaserConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse_toml(&content)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stake.min <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "stake.min",
                reason: "must be positive".to_string(),
            });
        }
        if self.stake.max < self.stake.min {
            return Err(ConfigError::InvalidValue {
                field: "stake.max",
                reason: format!("must be at least stake.min ({})", self.stake.min),
            });
        }
        if self.payout_tolerance < Decimal::ZERO {
            return Err(ConfigError::InvalidValue {
                field: "payout_tolerance",
                reason: "must not be negative".to_string(),
            });
        }
        for price in &self.teaser.prices {
            if price.legs < 2 {
                return Err(ConfigError::InvalidValue {
                    field: "teaser.prices",
                    reason: format!("a teaser has at least 2 legs, got {}", price.legs),
                });
            }
            if price.points <= Decimal::ZERO {
                return Err(ConfigError::InvalidValue {
                    field: "teaser.prices",
                    reason: format!("teaser points must be positive, got {}", price.points),
                });
            }
        }
        self.teaser_table()?;
        Ok(())
    }

    pub fn teaser_table(&self) -> Result<TeaserTable, ConfigError> {
        TeaserTable::new(
            self.teaser
                .prices
                .iter()
                .map(|p| (p.legs, p.points, p.american)),
        )
        .map_err(|e: OddsError| ConfigError::InvalidValue {
            field: "teaser.prices",
            reason: e.to_string(),
        })
    }

    pub fn rule_engine(&self) -> LegalityRuleEngine {
        LegalityRuleEngine::new(&self.teaser.leagues)
    }

    /// Build the slip builder these settings describe
    pub fn slip_builder(&self) -> Result<BetSlipBuilder, ConfigError> {
        self.validate()?;
        Ok(BetSlipBuilder::new(
            self.rule_engine(),
            self.stake.clone(),
            self.teaser_table()?,
            self.payout_tolerance,
        ))
    }
}
