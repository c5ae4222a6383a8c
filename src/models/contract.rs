//! Contract model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::UsageType;

/// Contract from `contracts`. Belongs to a farm.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub duration_years: i32,
    pub bonus_years: i32,
    pub investor_price: Option<Decimal>,
    pub farmer_price: Option<Decimal>,
}

impl Contract {
    /// Per-tree price for the given usage.
    ///
    /// Personal use prefers the farmer price, investment prefers the investor
    /// price. Either falls back to the other when missing.
    pub fn price_for(&self, usage: UsageType) -> Option<Decimal> {
        match usage {
            UsageType::Personal => self.farmer_price.or(self.investor_price),
            UsageType::Investment => self.investor_price.or(self.farmer_price),
        }
    }
}
