//! In-progress checkout choice.
//!
//! A [`Selection`] tracks usage type, package, contract, tree count and the
//! verified referral for one checkout attempt. Tree count is always clamped
//! to `[min_trees, max_trees]`. Contract lookups are split into a ticket and a
//! completion so callers can run them without holding the selection. Only the
//! newest ticket is honored.

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::calculators::{self, BonusDuration, Quote};
use super::providers::ProviderResult;
use super::referral::ReferralSession;
use crate::models::{Contract, Farm, Package, UsageType};

/// Handle for one asynchronous contract lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractLookupTicket {
    pub generation: u64,
    pub package_id: Uuid,
    pub contract_id: Uuid,
}

/// State of the contract lookup for the selected package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupState {
    Idle,
    InFlight,
    /// Neither the provider nor the farm's embedded contracts had it
    Missing,
}

/// How a completed lookup was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractResolution {
    /// Provider returned the contract
    Resolved,
    /// Provider failed or had nothing; the farm's embedded contract was used
    FellBack,
    /// No contract could be found anywhere
    Missing,
    /// A newer selection superseded this lookup; the result was ignored
    Stale,
}

/// Reasons a selection cannot be committed yet. Messages are user-facing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please select a package or contract before continuing")]
    NothingSelected,

    #[error("The contract for this package is still loading")]
    ContractLookupPending,

    #[error("The contract for this package is not available")]
    ContractUnavailable,

    #[error("Please select at least one tree")]
    ZeroTrees,

    #[error("Only {available} trees are available but this package needs at least {required}")]
    InsufficientInventory { available: u32, required: u32 },

    #[error("Flexible payment is not available right now")]
    FlexiblePaymentUnavailable,

    #[error("{0}")]
    InvalidRegistration(String),
}

/// Snapshot handed to the booking flow at commit time
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub farm_id: Uuid,
    pub usage: UsageType,
    pub package_id: Option<Uuid>,
    pub contract_id: Uuid,
    pub quote: Quote,
    pub influencer_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Selection {
    farm_id: Uuid,
    usage: UsageType,
    package: Option<Package>,
    contract: Option<Contract>,
    tree_count: u32,
    max_trees: u32,
    referral: Option<ReferralSession>,
    embedded_contracts: Vec<Contract>,
    generation: u64,
    lookup: LookupState,
}

impl Selection {
    pub fn new(farm: &Farm, usage: UsageType) -> Self {
        let mut selection = Self {
            farm_id: farm.id,
            usage,
            package: None,
            contract: None,
            tree_count: 0,
            max_trees: farm.available_trees,
            referral: None,
            embedded_contracts: farm.contracts.clone(),
            generation: 0,
            lookup: LookupState::Idle,
        };
        selection.tree_count = selection.clamp(selection.min_trees());
        selection
    }

    pub fn farm_id(&self) -> Uuid {
        self.farm_id
    }

    pub fn usage(&self) -> UsageType {
        self.usage
    }

    pub fn package(&self) -> Option<&Package> {
        self.package.as_ref()
    }

    pub fn contract(&self) -> Option<&Contract> {
        self.contract.as_ref()
    }

    pub fn tree_count(&self) -> u32 {
        self.tree_count
    }

    pub fn lookup_state(&self) -> LookupState {
        self.lookup
    }

    pub fn referral(&self) -> Option<&ReferralSession> {
        self.referral.as_ref()
    }

    /// Lower bound: the package minimum, never below one tree
    pub fn min_trees(&self) -> u32 {
        self.package
            .as_ref()
            .map(|p| p.terms().min_trees)
            .unwrap_or(1)
            .max(1)
    }

    /// Upper bound: the farm's available inventory
    pub fn max_trees(&self) -> u32 {
        self.max_trees
    }

    /// Switch usage type, clearing the previous choice.
    ///
    /// Auto-selects the featured package for the new usage type if the
    /// catalog flags one. Returns the contract lookup to run in that case.
    pub fn set_usage_type(
        &mut self,
        usage: UsageType,
        packages: &[Package],
    ) -> Option<ContractLookupTicket> {
        self.usage = usage;
        self.package = None;
        self.contract = None;
        self.lookup = LookupState::Idle;
        self.generation += 1;
        self.tree_count = self.clamp(self.min_trees());

        let featured = packages
            .iter()
            .find(|p| p.usage_type() == usage && p.is_featured())?;
        debug!("Auto-selecting featured package {}", featured.id());
        Some(self.select_package(featured.clone()))
    }

    /// Select a package. Resets the tree count to the package minimum and
    /// starts a contract lookup, superseding any lookup still in flight.
    pub fn select_package(&mut self, package: Package) -> ContractLookupTicket {
        self.usage = package.usage_type();
        self.generation += 1;
        let ticket = ContractLookupTicket {
            generation: self.generation,
            package_id: package.id(),
            contract_id: package.contract_id(),
        };

        self.package = Some(package);
        self.contract = None;
        self.lookup = LookupState::InFlight;
        self.tree_count = self.clamp(self.min_trees());
        ticket
    }

    /// Apply the result of a contract lookup.
    ///
    /// On provider failure or a missing record, falls back to the farm's
    /// embedded contract with the same id.
    pub fn complete_contract_lookup(
        &mut self,
        ticket: ContractLookupTicket,
        result: ProviderResult<Option<Contract>>,
    ) -> ContractResolution {
        if ticket.generation != self.generation {
            debug!(
                "Ignoring stale contract lookup for package {}",
                ticket.package_id
            );
            return ContractResolution::Stale;
        }

        let resolution = match result {
            Ok(Some(contract)) => {
                self.contract = Some(contract);
                ContractResolution::Resolved
            }
            Ok(None) => self.fall_back(ticket.contract_id, "not returned by provider"),
            Err(e) => {
                warn!("Contract lookup failed for {}: {}", ticket.contract_id, e);
                self.fall_back(ticket.contract_id, "provider error")
            }
        };

        self.lookup = if resolution == ContractResolution::Missing {
            LookupState::Missing
        } else {
            LookupState::Idle
        };
        resolution
    }

    fn fall_back(&mut self, contract_id: Uuid, reason: &str) -> ContractResolution {
        match self.embedded_contracts.iter().find(|c| c.id == contract_id) {
            Some(contract) => {
                info!(
                    "Using embedded contract {} for selection ({})",
                    contract_id, reason
                );
                self.contract = Some(contract.clone());
                ContractResolution::FellBack
            }
            None => {
                warn!("No contract {} available ({})", contract_id, reason);
                self.contract = None;
                ContractResolution::Missing
            }
        }
    }

    /// Choose a contract directly, without a package
    pub fn select_contract(&mut self, contract: Contract) {
        self.generation += 1;
        self.package = None;
        self.contract = Some(contract);
        self.lookup = LookupState::Idle;
        self.tree_count = self.clamp(self.min_trees());
    }

    /// Set an explicit tree count (slider or quick-select). Returns the
    /// clamped value.
    pub fn set_tree_count(&mut self, value: u32) -> u32 {
        self.tree_count = self.clamp(value);
        self.tree_count
    }

    /// Move the tree count by `delta`, clamped to the bounds
    pub fn change_tree_count(&mut self, delta: i64) -> u32 {
        let target = i64::from(self.tree_count).saturating_add(delta);
        let target = u32::try_from(target.max(0)).unwrap_or(u32::MAX);
        self.set_tree_count(target)
    }

    /// One step up, using the package's increment
    pub fn increment(&mut self) -> u32 {
        let step = self.step();
        self.change_tree_count(i64::from(step))
    }

    /// One step down, using the package's increment
    pub fn decrement(&mut self) -> u32 {
        let step = self.step();
        self.change_tree_count(-i64::from(step))
    }

    fn step(&self) -> u32 {
        self.package.as_ref().map(|p| p.tree_increment()).unwrap_or(1)
    }

    fn clamp(&self, value: u32) -> u32 {
        let (min, max) = (self.min_trees(), self.max_trees);
        if max < min {
            return 0;
        }
        value.clamp(min, max)
    }

    pub fn apply_referral(&mut self, session: ReferralSession) {
        self.referral = Some(session);
    }

    pub fn clear_referral(&mut self) {
        self.referral = None;
    }

    fn referral_bonus(&self) -> Option<BonusDuration> {
        self.referral.as_ref().map(|r| r.bonus)
    }

    /// Price and bonus for the current snapshot
    pub fn quote(&self) -> Quote {
        calculators::quote(
            self.package.as_ref(),
            self.contract.as_ref(),
            self.usage,
            self.tree_count,
            self.referral_bonus(),
        )
    }

    /// Check the selection can be committed and return its summary
    pub fn validate_for_commit(&self) -> Result<CommitSummary, ValidationError> {
        if self.lookup == LookupState::InFlight {
            return Err(ValidationError::ContractLookupPending);
        }
        if self.package.is_none() && self.contract.is_none() {
            return Err(ValidationError::NothingSelected);
        }
        let contract = self
            .contract
            .as_ref()
            .ok_or(ValidationError::ContractUnavailable)?;
        if self.max_trees < self.min_trees() {
            return Err(ValidationError::InsufficientInventory {
                available: self.max_trees,
                required: self.min_trees(),
            });
        }
        if self.tree_count == 0 {
            return Err(ValidationError::ZeroTrees);
        }

        Ok(CommitSummary {
            farm_id: self.farm_id,
            usage: self.usage,
            package_id: self.package.as_ref().map(|p| p.id()),
            contract_id: contract.id,
            quote: self.quote(),
            influencer_code: self.referral.as_ref().map(|r| r.code.clone()),
        })
    }
}
