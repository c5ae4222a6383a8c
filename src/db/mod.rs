//! Postgres implementations of the booking providers

mod queries;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::booking::providers::{
    AuthProvider, CatalogProvider, IdentitySource, ProviderResult, Providers, ReferralProvider,
    ReservationProvider, SettingsProvider,
};
use crate::models::{
    Contract, Farm, FarmSummary, InfluencerPartner, NewReservation, NewUser, Package, Reservation,
    ReservationPatch, UsageType, User,
};

/// Catalog, reservations, referrals and settings backed by one pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provider set for requests without a signed-in user
    pub fn providers(self: &Arc<Self>) -> Providers {
        Providers {
            catalog: self.clone(),
            reservations: self.clone(),
            referrals: self.clone(),
            auth: Arc::new(PgAuthProvider::new(self.pool.clone(), None)),
            settings: self.clone(),
        }
    }
}

#[async_trait]
impl CatalogProvider for PgStore {
    async fn list_farms(&self) -> ProviderResult<Vec<FarmSummary>> {
        queries::list_farms(&self.pool).await
    }

    async fn list_active_packages(&self, usage: UsageType) -> ProviderResult<Vec<Package>> {
        queries::list_active_packages(&self.pool, usage).await
    }

    async fn get_contract(&self, contract_id: Uuid) -> ProviderResult<Option<Contract>> {
        queries::get_contract(&self.pool, contract_id).await
    }

    async fn get_farm(&self, farm_id: Uuid) -> ProviderResult<Option<Farm>> {
        let Some(summary) = queries::get_farm_summary(&self.pool, farm_id).await? else {
            return Ok(None);
        };
        let contracts = queries::get_farm_contracts(&self.pool, farm_id).await?;
        Ok(Some(Farm::from_summary(summary, contracts)))
    }
}

#[async_trait]
impl ReservationProvider for PgStore {
    async fn create_reservation(&self, payload: NewReservation) -> ProviderResult<Reservation> {
        let reservation = queries::insert_reservation(&self.pool, &payload).await?;
        debug!(
            "Created reservation {} ({}, {} trees)",
            reservation.id,
            reservation.status.as_str(),
            reservation.total_trees
        );
        Ok(reservation)
    }

    async fn update_reservation(&self, id: Uuid, patch: ReservationPatch) -> ProviderResult<()> {
        queries::update_reservation(&self.pool, id, &patch).await
    }

    async fn link_reservation_to_user(&self, id: Uuid, user_id: Uuid) -> ProviderResult<()> {
        queries::link_reservation(&self.pool, id, user_id).await
    }
}

#[async_trait]
impl ReferralProvider for PgStore {
    async fn verify_code(&self, code: &str) -> ProviderResult<Option<InfluencerPartner>> {
        queries::find_partner_by_code(&self.pool, code).await
    }
}

#[async_trait]
impl SettingsProvider for PgStore {
    async fn get_flag(&self, key: &str) -> ProviderResult<Option<String>> {
        queries::get_setting(&self.pool, key).await
    }
}

impl IdentitySource for PgStore {
    fn auth_for(&self, user_id: Option<Uuid>) -> Arc<dyn AuthProvider> {
        Arc::new(PgAuthProvider::new(self.pool.clone(), user_id))
    }
}

/// Identity for one request, read from the `profiles` table.
///
/// After registration the new profile becomes the current user for the rest
/// of the request.
pub struct PgAuthProvider {
    pool: PgPool,
    user_id: std::sync::Mutex<Option<Uuid>>,
}

impl PgAuthProvider {
    pub fn new(pool: PgPool, user_id: Option<Uuid>) -> Self {
        Self {
            pool,
            user_id: std::sync::Mutex::new(user_id),
        }
    }

    fn current_id(&self) -> Option<Uuid> {
        self.user_id.lock().map(|id| *id).unwrap_or(None)
    }
}

#[async_trait]
impl AuthProvider for PgAuthProvider {
    async fn current_user(&self) -> ProviderResult<Option<User>> {
        match self.current_id() {
            Some(id) => queries::get_profile(&self.pool, id).await,
            None => Ok(None),
        }
    }

    async fn register_user(&self, fields: NewUser) -> ProviderResult<User> {
        let user = queries::insert_profile(&self.pool, &fields).await?;
        if let Ok(mut current) = self.user_id.lock() {
            *current = Some(user.id);
        }
        Ok(user)
    }
}
