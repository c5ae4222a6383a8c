//! Server-side checkout sessions.
//!
//! A [`CheckoutSession`] is what one browser tab owns. It holds the catalog
//! it was opened with, the selection, the referral store for the session and
//! the booking flow. Sessions live in a [`CheckoutRegistry`] and expire after
//! a period of inactivity. Their referral state goes with them.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::calculators::BonusDuration;
use super::catalog::{Catalog, CatalogError, CatalogResolver};
use super::flow::{BookingFlow, BookingReceipt, FlowError, FlowStep, PaymentMode, TransitionError};
use super::providers::{Providers, ProviderResult, ReferralProvider};
use super::referral::{
    InMemorySessionStore, NavigationKind, ReferralError, ReferralOutcome, ReferralVerifier,
};
use super::selection::{ContractLookupTicket, ContractResolution, Selection};
use super::settings::FlowSettings;
use crate::models::{Contract, NewUser, UsageType};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("The selection can only be changed at the review step (currently {0:?})")]
    SelectionLocked(FlowStep),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Referral(#[from] ReferralError),
}

/// A change to the tree count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TreeChange {
    Set { value: u32 },
    Delta { delta: i64 },
    Increment,
    Decrement,
    QuickSelect { value: u32 },
}

pub struct CheckoutSession {
    id: Uuid,
    catalog: Catalog,
    selection: Selection,
    flow: BookingFlow,
    referrals: ReferralVerifier,
}

impl CheckoutSession {
    /// Open a checkout for a farm with session-scoped referral storage
    pub async fn open(
        resolver: &CatalogResolver,
        referral_provider: Arc<dyn ReferralProvider>,
        referral_bonus: BonusDuration,
        settings: FlowSettings,
        farm_id: Uuid,
        usage: UsageType,
    ) -> Result<Self, CatalogError> {
        let catalog = resolver.load(farm_id, usage).await?;
        let selection = resolver.open_selection(&catalog).await;
        let referrals = ReferralVerifier::new(
            referral_provider,
            Arc::new(InMemorySessionStore::new()),
            referral_bonus,
        );

        Ok(Self {
            id: Uuid::new_v4(),
            catalog,
            selection,
            flow: BookingFlow::new(settings),
            referrals,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn flow(&self) -> &BookingFlow {
        &self.flow
    }

    pub fn set_settings(&mut self, settings: FlowSettings) {
        self.flow.apply_settings(settings);
    }

    fn ensure_editable(&self) -> Result<(), CheckoutError> {
        match self.flow.step() {
            FlowStep::Review => Ok(()),
            step => Err(CheckoutError::SelectionLocked(step)),
        }
    }

    pub async fn change_usage(
        &mut self,
        resolver: &CatalogResolver,
        usage: UsageType,
    ) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        let packages = resolver.packages(usage).await.map_err(CatalogError::from)?;
        self.catalog.usage = usage;
        self.catalog.packages = packages.as_ref().clone();

        if let Some(ticket) = self.selection.set_usage_type(usage, &self.catalog.packages) {
            let result = resolver.lookup_contract(ticket).await;
            self.selection.complete_contract_lookup(ticket, result);
        }
        Ok(())
    }

    /// Start selecting a package. The caller runs the lookup and hands the
    /// result to [`CheckoutSession::finish_package`].
    pub fn begin_package(&mut self, package_id: Uuid) -> Result<ContractLookupTicket, CheckoutError> {
        self.ensure_editable()?;
        let package = self
            .catalog
            .package(package_id)
            .cloned()
            .ok_or(CatalogError::PackageNotFound(package_id))?;
        Ok(self.selection.select_package(package))
    }

    pub fn finish_package(
        &mut self,
        ticket: ContractLookupTicket,
        result: ProviderResult<Option<Contract>>,
    ) -> ContractResolution {
        self.selection.complete_contract_lookup(ticket, result)
    }

    pub fn select_contract(&mut self, contract_id: Uuid) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        let contract = self
            .catalog
            .contract(contract_id)
            .cloned()
            .ok_or(CatalogError::ContractNotFound(contract_id))?;
        self.selection.select_contract(contract);
        Ok(())
    }

    pub fn change_trees(&mut self, change: TreeChange) -> Result<u32, CheckoutError> {
        self.ensure_editable()?;
        Ok(match change {
            TreeChange::Set { value } | TreeChange::QuickSelect { value } => {
                self.selection.set_tree_count(value)
            }
            TreeChange::Delta { delta } => self.selection.change_tree_count(delta),
            TreeChange::Increment => self.selection.increment(),
            TreeChange::Decrement => self.selection.decrement(),
        })
    }

    /// Referral edits follow the same lock as the rest of the selection
    pub async fn apply_referral(&mut self, code: &str) -> Result<ReferralOutcome, CheckoutError> {
        self.ensure_editable()?;
        let outcome = self.referrals.verify(code).await?;
        if let ReferralOutcome::Valid(session) = &outcome {
            self.selection.apply_referral(session.clone());
        }
        Ok(outcome)
    }

    pub async fn clear_referral(&mut self) -> Result<(), CheckoutError> {
        self.ensure_editable()?;
        self.referrals.clear().await;
        self.selection.clear_referral();
        Ok(())
    }

    /// Returns whether the referral was cleared
    pub async fn handle_navigation(&mut self, kind: NavigationKind) -> Result<bool, CheckoutError> {
        self.ensure_editable()?;
        let cleared = self.referrals.handle_navigation(kind).await;
        if cleared {
            self.selection.clear_referral();
        }
        Ok(cleared)
    }

    pub async fn confirm(
        &mut self,
        mode: PaymentMode,
        providers: &Providers,
    ) -> Result<FlowStep, FlowError> {
        self.flow.confirm_review(&self.selection, mode, providers).await
    }

    pub async fn register(
        &mut self,
        fields: NewUser,
        providers: &Providers,
    ) -> Result<FlowStep, FlowError> {
        self.flow.register(fields, providers).await
    }

    pub async fn pay(
        &mut self,
        payment_reference: &str,
        providers: &Providers,
    ) -> Result<BookingReceipt, FlowError> {
        let checkout_id = self.id;
        self.flow
            .complete_payment(payment_reference, providers, |receipt| {
                info!(
                    "Checkout {} completed with reservation {}",
                    checkout_id, receipt.reservation_id
                );
            })
            .await
    }

    pub fn back(&mut self) -> Result<FlowStep, TransitionError> {
        self.flow.back()
    }
}

pub type SharedCheckout = Arc<Mutex<CheckoutSession>>;

/// Live checkout sessions, expiring after a period of inactivity
#[derive(Clone)]
pub struct CheckoutRegistry {
    sessions: Cache<Uuid, SharedCheckout>,
}

impl CheckoutRegistry {
    pub fn new(idle: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle)
                .eviction_listener(|id, _, cause| {
                    debug!("Checkout {} dropped ({:?})", id, cause);
                })
                .build(),
        }
    }

    pub async fn insert(&self, session: CheckoutSession) -> SharedCheckout {
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, shared.clone()).await;
        shared
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedCheckout> {
        self.sessions.get(&id).await
    }

    pub async fn remove(&self, id: Uuid) {
        self.sessions.invalidate(&id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::test_support::{farm, investment_package, new_user, TestProviders};
    use rust_decimal_macros::dec;

    async fn open(test: &TestProviders) -> CheckoutSession {
        let farm = farm(1000);
        test.catalog.add_farm(farm.clone());
        let mut package = investment_package(&farm.contracts[0], dec!(150), 50);
        if let crate::models::Package::Investment(p) = &mut package {
            p.is_featured = true;
        }
        test.catalog.add_package(package);
        test.referrals.add_partner("GREEN", true, None);

        let resolver = CatalogResolver::new(test.providers.catalog.clone());
        CheckoutSession::open(
            &resolver,
            test.providers.referrals.clone(),
            BonusDuration::from_years(3),
            FlowSettings::default(),
            farm.id,
            UsageType::Investment,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_selects_featured_package() {
        let test = TestProviders::new();
        let session = open(&test).await;
        assert!(session.selection().package().is_some());
        assert!(session.selection().contract().is_some());
        assert_eq!(session.selection().tree_count(), 50);
        assert_eq!(session.flow().step(), FlowStep::Review);
    }

    #[tokio::test]
    async fn test_tree_changes() {
        let test = TestProviders::new();
        let mut session = open(&test).await;

        assert_eq!(session.change_trees(TreeChange::Set { value: 200 }).unwrap(), 200);
        assert_eq!(session.change_trees(TreeChange::Increment).unwrap(), 210);
        assert_eq!(session.change_trees(TreeChange::Decrement).unwrap(), 200);
        assert_eq!(session.change_trees(TreeChange::Delta { delta: -500 }).unwrap(), 50);
        assert_eq!(
            session.change_trees(TreeChange::QuickSelect { value: 5000 }).unwrap(),
            1000
        );
    }

    #[tokio::test]
    async fn test_selection_locked_after_confirm() {
        let test = TestProviders::new();
        let mut session = open(&test).await;
        session
            .confirm(PaymentMode::Immediate, &test.providers)
            .await
            .unwrap();

        assert!(matches!(
            session.change_trees(TreeChange::Increment),
            Err(CheckoutError::SelectionLocked(FlowStep::Registration))
        ));

        session.back().unwrap();
        assert!(session.change_trees(TreeChange::Increment).is_ok());
    }

    #[tokio::test]
    async fn test_referral_applies_and_clears_on_back_forward() {
        let test = TestProviders::new();
        let mut session = open(&test).await;

        let outcome = session.apply_referral("green").await.unwrap();
        assert!(outcome.is_valid());
        assert_eq!(session.selection().quote().bonus.years(), 3);

        assert!(session
            .handle_navigation(NavigationKind::BackForward)
            .await
            .unwrap());
        assert!(session.selection().referral().is_none());
        assert!(session.selection().quote().bonus.is_zero());
    }

    #[tokio::test]
    async fn test_referral_locked_after_confirm() {
        let test = TestProviders::new();
        let mut session = open(&test).await;
        session
            .confirm(PaymentMode::Immediate, &test.providers)
            .await
            .unwrap();
        let reservation_id = session.flow().reservation_id().unwrap();

        assert!(matches!(
            session.apply_referral("GREEN").await,
            Err(CheckoutError::SelectionLocked(FlowStep::Registration))
        ));
        assert!(matches!(
            session.clear_referral().await,
            Err(CheckoutError::SelectionLocked(FlowStep::Registration))
        ));
        assert!(matches!(
            session.handle_navigation(NavigationKind::BackForward).await,
            Err(CheckoutError::SelectionLocked(FlowStep::Registration))
        ));
        assert!(session.selection().referral().is_none());
        assert!(session.selection().quote().bonus.is_zero());
        assert_eq!(test.referrals.calls(), 0);

        session
            .register(new_user("ana@example.com"), &test.providers)
            .await
            .unwrap();
        let stored = test.reservations.get(reservation_id).unwrap();
        assert!(stored.influencer_code.is_none());
        assert_eq!(stored.bonus_years, 0);
    }

    #[tokio::test]
    async fn test_referral_cleared_before_reconfirm_is_not_stored() {
        let test = TestProviders::new();
        let mut session = open(&test).await;
        session.apply_referral("green").await.unwrap();
        session
            .confirm(PaymentMode::Immediate, &test.providers)
            .await
            .unwrap();
        let reservation_id = session.flow().reservation_id().unwrap();
        assert_eq!(
            test.reservations.get(reservation_id).unwrap().influencer_code.as_deref(),
            Some("GREEN")
        );

        session.back().unwrap();
        session.clear_referral().await.unwrap();
        session
            .confirm(PaymentMode::Immediate, &test.providers)
            .await
            .unwrap();

        let stored = test.reservations.get(reservation_id).unwrap();
        assert!(stored.influencer_code.is_none());
        assert_eq!(stored.bonus_years, 0);
    }

    #[tokio::test]
    async fn test_begin_unknown_package() {
        let test = TestProviders::new();
        let mut session = open(&test).await;

        assert!(matches!(
            session.begin_package(Uuid::new_v4()),
            Err(CheckoutError::Catalog(CatalogError::PackageNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_full_guest_checkout() {
        let test = TestProviders::new();
        let mut session = open(&test).await;
        session.change_trees(TreeChange::Set { value: 200 }).unwrap();

        assert_eq!(
            session
                .confirm(PaymentMode::Immediate, &test.providers)
                .await
                .unwrap(),
            FlowStep::Registration
        );
        assert_eq!(
            session
                .register(new_user("ana@example.com"), &test.providers)
                .await
                .unwrap(),
            FlowStep::Payment
        );
        let receipt = session.pay("pay_9", &test.providers).await.unwrap();
        assert_eq!(session.flow().step(), FlowStep::Success);

        let stored = test.reservations.get(receipt.reservation_id).unwrap();
        assert_eq!(stored.total_price, dec!(30000));
        assert_eq!(stored.user_id, receipt.user_id);
    }

    #[tokio::test]
    async fn test_registry_round_trip() {
        let test = TestProviders::new();
        let session = open(&test).await;
        let id = session.id();
        let registry = CheckoutRegistry::new(Duration::from_secs(60), 100);

        registry.insert(session).await;
        assert!(registry.get(id).await.is_some());
        registry.remove(id).await;
        assert!(registry.get(id).await.is_none());
    }
}
