//! In-memory providers and fixtures for tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use super::providers::{
    AuthProvider, CatalogProvider, IdentitySource, ProviderError, ProviderResult, Providers,
    ReferralProvider, ReservationProvider, SettingsProvider,
};
use crate::models::{
    AgriculturalPackage, Contract, Farm, FarmSummary, InfluencerPartner, InvestmentPackage,
    NewReservation, NewUser, Package, Reservation, ReservationPatch, UsageType, User,
};

pub fn contract_for(farm_id: Uuid, investor: Decimal, farmer: Decimal) -> Contract {
    Contract {
        id: Uuid::new_v4(),
        farm_id,
        duration_years: 10,
        bonus_years: 0,
        investor_price: Some(investor),
        farmer_price: Some(farmer),
    }
}

/// Farm with two contracts
pub fn farm(available_trees: u32) -> Farm {
    let id = Uuid::new_v4();
    Farm {
        id,
        name: "Finca Verde".to_string(),
        location: Some("Andalucia".to_string()),
        available_trees,
        description: None,
        contracts: vec![
            contract_for(id, dec!(100), dec!(90)),
            contract_for(id, dec!(70), dec!(60)),
        ],
    }
}

pub fn investment_package(contract: &Contract, price: Decimal, min_trees: u32) -> Package {
    Package::Investment(InvestmentPackage {
        id: Uuid::new_v4(),
        contract_id: contract.id,
        name: format!("Invest {}", min_trees),
        price_per_tree: price,
        min_trees,
        bonus_free_years: 0,
        is_featured: false,
        sort_order: 0,
        tree_increment: 10,
        quick_select_options: vec![100, 200, 500],
    })
}

pub fn personal_package(contract: &Contract, price: Decimal, featured: bool) -> Package {
    Package::Agricultural(AgriculturalPackage {
        id: Uuid::new_v4(),
        contract_id: contract.id,
        name: "Family".to_string(),
        price_per_tree: price,
        min_trees: 1,
        bonus_free_years: 1,
        is_featured: featured,
        sort_order: 1,
    })
}

pub fn new_user(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        first_name: Some("Ana".to_string()),
        last_name: None,
        phone: None,
    }
}

#[derive(Default)]
pub struct MockCatalog {
    farms: Mutex<HashMap<Uuid, Farm>>,
    packages: Mutex<Vec<Package>>,
    contracts: Mutex<HashMap<Uuid, Contract>>,
    contract_failures: AtomicUsize,
    farm_failures: AtomicBool,
    contract_calls: AtomicUsize,
}

impl MockCatalog {
    pub fn add_farm(&self, farm: Farm) {
        let mut contracts = self.contracts.lock().unwrap();
        for contract in &farm.contracts {
            contracts.insert(contract.id, contract.clone());
        }
        self.farms.lock().unwrap().insert(farm.id, farm);
    }

    pub fn add_package(&self, package: Package) {
        self.packages.lock().unwrap().push(package);
    }

    /// Make the next `n` contract lookups fail
    pub fn fail_contract_lookups(&self, n: usize) {
        self.contract_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_farm_listing(&self) {
        self.farm_failures.store(true, Ordering::SeqCst);
    }

    pub fn contract_calls(&self) -> usize {
        self.contract_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogProvider for MockCatalog {
    async fn list_farms(&self) -> ProviderResult<Vec<FarmSummary>> {
        if self.farm_failures.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("farms offline".to_string()));
        }
        Ok(self
            .farms
            .lock()
            .unwrap()
            .values()
            .map(|f| FarmSummary {
                id: f.id,
                name: f.name.clone(),
                location: f.location.clone(),
                available_trees: f.available_trees as i32,
                description: f.description.clone(),
            })
            .collect())
    }

    async fn list_active_packages(&self, usage: UsageType) -> ProviderResult<Vec<Package>> {
        let mut packages: Vec<Package> = self
            .packages
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.usage_type() == usage)
            .cloned()
            .collect();
        packages.sort_by_key(|p| p.sort_order());
        Ok(packages)
    }

    async fn get_contract(&self, contract_id: Uuid) -> ProviderResult<Option<Contract>> {
        self.contract_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .contract_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::Unavailable("contracts offline".to_string()));
        }
        Ok(self.contracts.lock().unwrap().get(&contract_id).cloned())
    }

    async fn get_farm(&self, farm_id: Uuid) -> ProviderResult<Option<Farm>> {
        Ok(self.farms.lock().unwrap().get(&farm_id).cloned())
    }
}

#[derive(Default)]
pub struct MockReservations {
    reservations: Mutex<HashMap<Uuid, Reservation>>,
    created: AtomicUsize,
    fail_create: AtomicBool,
    link_failures: AtomicUsize,
}

impl MockReservations {
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.lock().unwrap().get(&id).cloned()
    }

    pub fn fail_next_create(&self) {
        self.fail_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_links(&self, n: usize) {
        self.link_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReservationProvider for MockReservations {
    async fn create_reservation(&self, payload: NewReservation) -> ProviderResult<Reservation> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("insert failed".to_string()));
        }
        let reservation = Reservation {
            id: Uuid::new_v4(),
            farm_id: payload.farm_id,
            contract_id: payload.contract_id,
            duration_years: payload.duration_years,
            bonus_years: payload.bonus_years,
            bonus_months: payload.bonus_months,
            total_trees: payload.total_trees,
            total_price: payload.total_price,
            status: payload.status,
            guest_id: payload.guest_id,
            user_id: payload.user_id,
            payment_deadline: payload.payment_deadline,
            influencer_code: payload.influencer_code,
            created_at: Utc::now(),
        };
        self.created.fetch_add(1, Ordering::SeqCst);
        self.reservations
            .lock()
            .unwrap()
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn update_reservation(&self, id: Uuid, patch: ReservationPatch) -> ProviderResult<()> {
        let mut reservations = self.reservations.lock().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or_else(|| ProviderError::NotFound(format!("Reservation {}", id)))?;
        patch.apply(reservation);
        Ok(())
    }

    async fn link_reservation_to_user(&self, id: Uuid, user_id: Uuid) -> ProviderResult<()> {
        let failing = self
            .link_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::Unavailable("link failed".to_string()));
        }
        let mut reservations = self.reservations.lock().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or_else(|| ProviderError::NotFound(format!("Reservation {}", id)))?;
        reservation.guest_id = None;
        reservation.user_id = Some(user_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockReferrals {
    partners: Mutex<Vec<InfluencerPartner>>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MockReferrals {
    pub fn add_partner(&self, code: &str, is_active: bool, bonus_months: Option<i32>) {
        self.partners.lock().unwrap().push(InfluencerPartner {
            id: Uuid::new_v4(),
            name: format!("Partner {}", code),
            code: code.to_string(),
            is_active,
            bonus_months,
        });
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReferralProvider for MockReferrals {
    async fn verify_code(&self, code: &str) -> ProviderResult<Option<InfluencerPartner>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("referrals offline".to_string()));
        }
        Ok(self
            .partners
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .cloned())
    }
}

#[derive(Default)]
pub struct MockAuth {
    current: Mutex<Option<User>>,
    registered: AtomicUsize,
    fail_register: AtomicBool,
    fail_current: AtomicBool,
}

impl MockAuth {
    pub fn sign_in(&self, email: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        };
        *self.current.lock().unwrap() = Some(user.clone());
        user
    }

    pub fn fail_next_register(&self) {
        self.fail_register.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_current_user(&self) {
        self.fail_current.store(true, Ordering::SeqCst);
    }

    pub fn registered_count(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProvider for MockAuth {
    async fn current_user(&self) -> ProviderResult<Option<User>> {
        if self.fail_current.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("session lookup failed".to_string()));
        }
        Ok(self.current.lock().unwrap().clone())
    }

    async fn register_user(&self, fields: NewUser) -> ProviderResult<User> {
        if self.fail_register.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("auth offline".to_string()));
        }
        self.registered.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id: Uuid::new_v4(),
            email: fields.email,
            first_name: fields.first_name,
            last_name: fields.last_name,
            phone: fields.phone,
        };
        *self.current.lock().unwrap() = Some(user.clone());
        Ok(user)
    }
}

/// Hands every request the same auth mock
pub struct SharedIdentity(pub Arc<MockAuth>);

impl IdentitySource for SharedIdentity {
    fn auth_for(&self, _user_id: Option<Uuid>) -> Arc<dyn AuthProvider> {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct MockSettings {
    values: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl MockSettings {
    pub fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettingsProvider for MockSettings {
    async fn get_flag(&self, key: &str) -> ProviderResult<Option<String>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("settings offline".to_string()));
        }
        Ok(self.values.lock().unwrap().get(key).cloned())
    }
}

/// Mocks wired into a [`Providers`] bundle, with handles kept for assertions
pub struct TestProviders {
    pub providers: Providers,
    pub catalog: Arc<MockCatalog>,
    pub reservations: Arc<MockReservations>,
    pub referrals: Arc<MockReferrals>,
    pub auth: Arc<MockAuth>,
    pub settings: Arc<MockSettings>,
}

impl TestProviders {
    pub fn new() -> Self {
        Self::build(Arc::default(), Arc::default())
    }

    /// Fresh reservations, auth and settings over another run's catalog and partners
    pub fn sharing_catalog(other: &TestProviders) -> Self {
        Self::build(other.catalog.clone(), other.referrals.clone())
    }

    fn build(catalog: Arc<MockCatalog>, referrals: Arc<MockReferrals>) -> Self {
        let reservations = Arc::new(MockReservations::default());
        let auth = Arc::new(MockAuth::default());
        let settings = Arc::new(MockSettings::default());
        let providers = Providers {
            catalog: catalog.clone(),
            reservations: reservations.clone(),
            referrals: referrals.clone(),
            auth: auth.clone(),
            settings: settings.clone(),
        };
        Self {
            providers,
            catalog,
            reservations,
            referrals,
            auth,
            settings,
        }
    }
}
