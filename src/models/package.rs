//! Package models
//!
//! Two package kinds exist in the catalog: agricultural packages for personal
//! use and investment packages. Both reference a contract and carry the
//! fields the calculator needs, exposed through [`PackageTerms`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::non_negative;

/// What the customer intends to do with the trees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Personal,
    Investment,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Personal => "personal",
            UsageType::Investment => "investment",
        }
    }
}

impl std::str::FromStr for UsageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "personal" | "agricultural" => Ok(UsageType::Personal),
            "investment" => Ok(UsageType::Investment),
            other => Err(format!("unknown usage type '{}'", other)),
        }
    }
}

/// Row from `agricultural_packages`
#[derive(Debug, Clone, FromRow)]
pub struct AgriculturalPackageRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub price_per_tree: Decimal,
    pub min_trees: i32,
    pub bonus_free_years: i32,
    pub is_featured: bool,
    pub sort_order: i32,
}

/// Row from `investment_packages`
#[derive(Debug, Clone, FromRow)]
pub struct InvestmentPackageRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub price_per_tree: Decimal,
    pub min_trees: i32,
    pub bonus_free_years: i32,
    pub is_featured: bool,
    pub sort_order: i32,
    pub tree_increment: i32,
    pub quick_select_options: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgriculturalPackage {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub price_per_tree: Decimal,
    pub min_trees: u32,
    pub bonus_free_years: u32,
    pub is_featured: bool,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPackage {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub name: String,
    pub price_per_tree: Decimal,
    pub min_trees: u32,
    pub bonus_free_years: u32,
    pub is_featured: bool,
    pub sort_order: i32,
    pub tree_increment: u32,
    pub quick_select_options: Vec<u32>,
}

impl From<AgriculturalPackageRow> for AgriculturalPackage {
    fn from(row: AgriculturalPackageRow) -> Self {
        Self {
            id: row.id,
            contract_id: row.contract_id,
            name: row.name,
            price_per_tree: row.price_per_tree,
            min_trees: non_negative(row.min_trees),
            bonus_free_years: non_negative(row.bonus_free_years),
            is_featured: row.is_featured,
            sort_order: row.sort_order,
        }
    }
}

impl From<InvestmentPackageRow> for InvestmentPackage {
    fn from(row: InvestmentPackageRow) -> Self {
        let mut quick_select_options: Vec<u32> = row
            .quick_select_options
            .into_iter()
            .filter(|v| *v > 0)
            .map(non_negative)
            .collect();
        quick_select_options.sort_unstable();
        quick_select_options.dedup();

        Self {
            id: row.id,
            contract_id: row.contract_id,
            name: row.name,
            price_per_tree: row.price_per_tree,
            min_trees: non_negative(row.min_trees),
            bonus_free_years: non_negative(row.bonus_free_years),
            is_featured: row.is_featured,
            sort_order: row.sort_order,
            tree_increment: non_negative(row.tree_increment).max(1),
            quick_select_options,
        }
    }
}

/// A catalog package, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Package {
    Agricultural(AgriculturalPackage),
    Investment(InvestmentPackage),
}

/// The fields of a package the calculator and selection care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageTerms {
    pub contract_id: Uuid,
    pub price_per_tree: Decimal,
    pub min_trees: u32,
    pub bonus_free_years: u32,
}

impl Package {
    pub fn id(&self) -> Uuid {
        match self {
            Package::Agricultural(p) => p.id,
            Package::Investment(p) => p.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Package::Agricultural(p) => &p.name,
            Package::Investment(p) => &p.name,
        }
    }

    pub fn usage_type(&self) -> UsageType {
        match self {
            Package::Agricultural(_) => UsageType::Personal,
            Package::Investment(_) => UsageType::Investment,
        }
    }

    pub fn is_featured(&self) -> bool {
        match self {
            Package::Agricultural(p) => p.is_featured,
            Package::Investment(p) => p.is_featured,
        }
    }

    pub fn sort_order(&self) -> i32 {
        match self {
            Package::Agricultural(p) => p.sort_order,
            Package::Investment(p) => p.sort_order,
        }
    }

    pub fn terms(&self) -> PackageTerms {
        match self {
            Package::Agricultural(p) => PackageTerms {
                contract_id: p.contract_id,
                price_per_tree: p.price_per_tree,
                min_trees: p.min_trees,
                bonus_free_years: p.bonus_free_years,
            },
            Package::Investment(p) => PackageTerms {
                contract_id: p.contract_id,
                price_per_tree: p.price_per_tree,
                min_trees: p.min_trees,
                bonus_free_years: p.bonus_free_years,
            },
        }
    }

    pub fn contract_id(&self) -> Uuid {
        self.terms().contract_id
    }

    /// Step used by the increment and decrement buttons
    pub fn tree_increment(&self) -> u32 {
        match self {
            Package::Agricultural(_) => 1,
            Package::Investment(p) => p.tree_increment.max(1),
        }
    }

    pub fn quick_select_options(&self) -> &[u32] {
        match self {
            Package::Agricultural(_) => &[],
            Package::Investment(p) => &p.quick_select_options,
        }
    }
}

impl From<AgriculturalPackageRow> for Package {
    fn from(row: AgriculturalPackageRow) -> Self {
        Package::Agricultural(row.into())
    }
}

impl From<InvestmentPackageRow> for Package {
    fn from(row: InvestmentPackageRow) -> Self {
        Package::Investment(row.into())
    }
}
