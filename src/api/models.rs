/// API request/response models
use crate::domain::models::{BetRecord, ValidationResult, Violation};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ===== Request Models =====

#[derive(Debug, Deserialize)]
pub struct OpenWalletRequest {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub opening_balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub amount: Decimal,
}

// ===== Response Models =====

/// Body returned when a slip fails validation, suitable for direct display
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionResponse {
    pub is_valid: bool,
    pub errors: Vec<Violation>,
    pub warnings: Vec<String>,
}

impl From<&ValidationResult> for RejectionResponse {
    fn from(result: &ValidationResult) -> Self {
        Self {
            is_valid: result.is_valid(),
            errors: result.errors.clone(),
            warnings: result.warnings.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BetsResponse {
    pub bets: Vec<BetRecord>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub reservation_id: Uuid,
    pub released: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
