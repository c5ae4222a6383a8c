//! Core price and bonus calculation functions.
//!
//! Pure functions for booking math - no database access. The selection
//! re-derives a [`Quote`] from its current snapshot on every read, so a
//! package switch can never leave a stale total behind.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Contract, Package, UsageType};

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use tree_booking::booking::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Extra contract time granted on top of the contract duration.
///
/// Months are the canonical unit; package bonuses are declared in years and
/// converted on the way in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, serde::Deserialize)]
pub struct BonusDuration {
    total_months: u32,
}

impl BonusDuration {
    pub const ZERO: BonusDuration = BonusDuration { total_months: 0 };

    pub fn from_months(months: u32) -> Self {
        Self {
            total_months: months,
        }
    }

    pub fn from_years(years: u32) -> Self {
        Self {
            total_months: years.saturating_mul(12),
        }
    }

    pub fn total_months(&self) -> u32 {
        self.total_months
    }

    /// Whole years
    pub fn years(&self) -> u32 {
        self.total_months / 12
    }

    /// Months left over after whole years
    pub fn months(&self) -> u32 {
        self.total_months % 12
    }

    pub fn is_zero(&self) -> bool {
        self.total_months == 0
    }
}

impl std::ops::Add for BonusDuration {
    type Output = BonusDuration;

    fn add(self, rhs: BonusDuration) -> BonusDuration {
        BonusDuration::from_months(self.total_months.saturating_add(rhs.total_months))
    }
}

/// Per-tree price for the current choice.
///
/// The package price wins when a package is selected, otherwise the contract
/// price for the usage type, otherwise zero.
pub fn price_per_tree(
    package: Option<&Package>,
    contract: Option<&Contract>,
    usage: UsageType,
) -> Decimal {
    if let Some(package) = package {
        return package.terms().price_per_tree;
    }
    contract
        .and_then(|c| c.price_for(usage))
        .unwrap_or(Decimal::ZERO)
}

/// Total price for `tree_count` trees. Zero trees always cost zero.
pub fn calculate_total(
    package: Option<&Package>,
    contract: Option<&Contract>,
    usage: UsageType,
    tree_count: u32,
) -> Decimal {
    if tree_count == 0 {
        return Decimal::ZERO;
    }
    round_money(
        price_per_tree(package, contract, usage) * Decimal::from(tree_count),
        2,
    )
}

/// Bonus duration for the current choice.
///
/// The package's declared bonus applies when a package is selected, the
/// contract's bonus years otherwise. A verified referral bonus is added on
/// top and never replaces the base bonus.
pub fn calculate_bonus(
    package: Option<&Package>,
    contract: Option<&Contract>,
    referral_bonus: Option<BonusDuration>,
) -> BonusDuration {
    let base = match (package, contract) {
        (Some(package), _) => BonusDuration::from_years(package.terms().bonus_free_years),
        (None, Some(contract)) => {
            BonusDuration::from_years(u32::try_from(contract.bonus_years).unwrap_or(0))
        }
        (None, None) => BonusDuration::ZERO,
    };

    base + referral_bonus.unwrap_or(BonusDuration::ZERO)
}

/// Everything the review step shows about price and duration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    #[serde(with = "rust_decimal::serde::str")]
    pub price_per_tree: Decimal,
    pub tree_count: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    pub duration_years: u32,
    pub bonus: BonusDuration,
}

/// Build a quote from a selection snapshot
pub fn quote(
    package: Option<&Package>,
    contract: Option<&Contract>,
    usage: UsageType,
    tree_count: u32,
    referral_bonus: Option<BonusDuration>,
) -> Quote {
    Quote {
        price_per_tree: price_per_tree(package, contract, usage),
        tree_count,
        total_price: calculate_total(package, contract, usage, tree_count),
        duration_years: contract
            .map(|c| u32::try_from(c.duration_years).unwrap_or(0))
            .unwrap_or(0),
        bonus: calculate_bonus(package, contract, referral_bonus),
    }
}
