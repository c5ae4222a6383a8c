//! Booking engine for tree adoption and investment.
//!
//! Covers package and contract selection, price and bonus calculation,
//! referral codes and the multi-step flow that commits a reservation.
//! The HTTP surface lives in [`routes`].

pub mod calculators;
pub mod catalog;
pub mod checkout;
pub mod flow;
pub mod providers;
pub mod referral;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod selection;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items
pub use calculators::{round_money, BonusDuration, Quote};
pub use catalog::{Catalog, CatalogError, CatalogResolver};
pub use checkout::{CheckoutRegistry, CheckoutSession};
pub use flow::{BookingFlow, BookingReceipt, FlowError, FlowStep, PaymentMode};
pub use providers::{IdentitySource, ProviderError, ProviderResult, Providers};
pub use referral::{ReferralError, ReferralOutcome, ReferralVerifier};
pub use routes::router;
pub use selection::{Selection, ValidationError};
pub use settings::FlowSettings;
