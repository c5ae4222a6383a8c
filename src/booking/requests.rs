//! Request DTOs for checkout API endpoints.

use serde::Deserialize;
use uuid::Uuid;

use super::flow::PaymentMode;
use super::referral::NavigationKind;
use crate::models::UsageType;

/// Query for a farm's catalog
#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    #[serde(default = "default_usage")]
    pub usage: UsageType,
}

fn default_usage() -> UsageType {
    UsageType::Personal
}

/// Request to open a checkout
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub farm_id: Uuid,
    #[serde(default = "default_usage")]
    pub usage: UsageType,
    /// Referral code carried over from a landing link
    #[serde(default)]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeUsageRequest {
    pub usage: UsageType,
}

#[derive(Debug, Deserialize)]
pub struct SelectPackageRequest {
    pub package_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SelectContractRequest {
    pub contract_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ApplyReferralRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct NavigationRequest {
    pub kind: NavigationKind,
}

/// Request to confirm the review step
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default = "default_mode")]
    pub payment_mode: PaymentMode,
}

fn default_mode() -> PaymentMode {
    PaymentMode::Immediate
}

/// Payment callback from the processor widget
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub payment_reference: String,
}
