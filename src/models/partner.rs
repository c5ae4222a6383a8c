//! Influencer partner model

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Partner from `influencer_partners`. A code only unlocks bonuses while active.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct InfluencerPartner {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub is_active: bool,
    /// Referral bonus in months. `None` means the platform default applies.
    pub bonus_months: Option<i32>,
}
