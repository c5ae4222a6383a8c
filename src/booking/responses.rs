//! Response DTOs for checkout API endpoints.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::calculators::Quote;
use super::catalog::Catalog;
use super::checkout::CheckoutSession;
use super::flow::{BookingReceipt, FlowStep};
use super::referral::{ReferralOutcome, ReferralSession};
use super::selection::LookupState;
use crate::models::{Contract, Farm, Package, UsageType};

/// Money value for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct MoneyResponse {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub currency: String,
}

impl MoneyResponse {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub price_per_tree: MoneyResponse,
    pub total_price: MoneyResponse,
    pub tree_count: u32,
    pub duration_years: u32,
    pub bonus_years: u32,
    pub bonus_months: u32,
    pub bonus_total_months: u32,
}

impl QuoteResponse {
    pub fn from_quote(quote: &Quote, currency: &str) -> Self {
        Self {
            price_per_tree: MoneyResponse::new(quote.price_per_tree, currency),
            total_price: MoneyResponse::new(quote.total_price, currency),
            tree_count: quote.tree_count,
            duration_years: quote.duration_years,
            bonus_years: quote.bonus.years(),
            bonus_months: quote.bonus.months(),
            bonus_total_months: quote.bonus.total_months(),
        }
    }
}

/// What a farm offers for one usage type
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub farm: Farm,
    pub usage: UsageType,
    pub packages: Vec<Package>,
    pub featured_package_id: Option<Uuid>,
}

impl From<Catalog> for CatalogResponse {
    fn from(catalog: Catalog) -> Self {
        Self {
            featured_package_id: catalog.featured_package().map(|p| p.id()),
            farm: catalog.farm,
            usage: catalog.usage,
            packages: catalog.packages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FarmResponse {
    pub id: Uuid,
    pub name: String,
    pub location: Option<String>,
    pub available_trees: u32,
}

/// Tree count stepper bounds
#[derive(Debug, Serialize)]
pub struct TreeBoundsResponse {
    pub min: u32,
    pub max: u32,
    pub increment: u32,
    pub quick_select: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct ReferralResponse {
    pub code: String,
    pub partner_name: String,
    pub bonus_years: u32,
    pub bonus_months: u32,
}

impl From<&ReferralSession> for ReferralResponse {
    fn from(session: &ReferralSession) -> Self {
        Self {
            code: session.code.clone(),
            partner_name: session.partner_name.clone(),
            bonus_years: session.bonus.years(),
            bonus_months: session.bonus.months(),
        }
    }
}

/// Full view of a checkout for the booking page
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub id: Uuid,
    pub farm: FarmResponse,
    pub usage: UsageType,
    pub step: FlowStep,
    pub can_go_back: bool,
    pub packages: Vec<Package>,
    pub contracts: Vec<Contract>,
    pub selected_package_id: Option<Uuid>,
    pub selected_contract: Option<Contract>,
    pub contract_lookup: LookupState,
    pub trees: TreeBoundsResponse,
    pub quote: QuoteResponse,
    pub referral: Option<ReferralResponse>,
    /// Featured package offered to referred visitors
    pub featured_offer: Option<Uuid>,
    pub flexible_payment_enabled: bool,
    pub grace_period_days: u32,
    pub reservation_id: Option<Uuid>,
}

impl CheckoutResponse {
    pub fn build(session: &CheckoutSession, currency: &str) -> Self {
        let catalog = session.catalog();
        let selection = session.selection();
        let flow = session.flow();
        let settings = flow.settings();
        let package = selection.package();

        let featured_offer = selection
            .referral()
            .and(catalog.featured_package())
            .map(|p| p.id());

        Self {
            id: session.id(),
            farm: FarmResponse {
                id: catalog.farm.id,
                name: catalog.farm.name.clone(),
                location: catalog.farm.location.clone(),
                available_trees: catalog.farm.available_trees,
            },
            usage: selection.usage(),
            step: flow.step(),
            can_go_back: !flow.state().history().is_empty() && !flow.step().is_terminal(),
            packages: catalog.packages.clone(),
            contracts: catalog.farm.contracts.clone(),
            selected_package_id: package.map(|p| p.id()),
            selected_contract: selection.contract().cloned(),
            contract_lookup: selection.lookup_state(),
            trees: TreeBoundsResponse {
                min: selection.min_trees(),
                max: selection.max_trees(),
                increment: package.map(|p| p.tree_increment()).unwrap_or(1),
                quick_select: package
                    .map(|p| p.quick_select_options().to_vec())
                    .unwrap_or_default(),
            },
            quote: QuoteResponse::from_quote(&selection.quote(), currency),
            referral: selection.referral().map(ReferralResponse::from),
            featured_offer,
            flexible_payment_enabled: settings.flexible_payment_enabled,
            grace_period_days: settings.grace_period_days,
            reservation_id: flow.reservation_id(),
        }
    }
}

/// Result of a referral code check
#[derive(Debug, Serialize)]
pub struct ReferralCheckResponse {
    pub valid: bool,
    pub outcome: &'static str,
    pub message: String,
    pub checkout: CheckoutResponse,
}

impl ReferralCheckResponse {
    pub fn new(outcome: &ReferralOutcome, checkout: CheckoutResponse) -> Self {
        Self {
            valid: outcome.is_valid(),
            outcome: match outcome {
                ReferralOutcome::Valid(_) => "valid",
                ReferralOutcome::NotFound => "invalid_not_found",
                ReferralOutcome::Inactive => "invalid_inactive",
            },
            message: outcome.message(),
            checkout,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NavigationResponse {
    pub referral_cleared: bool,
    pub checkout: CheckoutResponse,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub receipt: BookingReceipt,
    pub checkout: CheckoutResponse,
}

/// Error body returned by every checkout endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
