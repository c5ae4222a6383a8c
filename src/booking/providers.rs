//! Collaborator ports the booking engine depends on.
//!
//! The engine never talks to the database directly. Production wiring uses
//! the Postgres implementations in [`crate::db`]; tests substitute in-memory
//! versions.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Contract, Farm, FarmSummary, InfluencerPartner, NewReservation, NewUser, Package, Reservation,
    ReservationPatch, UsageType, User,
};

/// Failure talking to a collaborator
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unexpected data: {0}")]
    Data(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn list_farms(&self) -> ProviderResult<Vec<FarmSummary>>;

    /// Active packages for a usage type, in catalog sort order
    async fn list_active_packages(&self, usage: UsageType) -> ProviderResult<Vec<Package>>;

    async fn get_contract(&self, contract_id: Uuid) -> ProviderResult<Option<Contract>>;

    /// Farm with its contracts embedded
    async fn get_farm(&self, farm_id: Uuid) -> ProviderResult<Option<Farm>>;
}

#[async_trait]
pub trait ReservationProvider: Send + Sync {
    async fn create_reservation(&self, payload: NewReservation) -> ProviderResult<Reservation>;

    async fn update_reservation(&self, id: Uuid, patch: ReservationPatch) -> ProviderResult<()>;

    /// Clear the guest id and set the owner. Calling it again for the same
    /// user must not fail or duplicate anything.
    async fn link_reservation_to_user(&self, id: Uuid, user_id: Uuid) -> ProviderResult<()>;
}

#[async_trait]
pub trait ReferralProvider: Send + Sync {
    /// Look up a partner by code, active or not
    async fn verify_code(&self, code: &str) -> ProviderResult<Option<InfluencerPartner>>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> ProviderResult<Option<User>>;

    async fn register_user(&self, fields: NewUser) -> ProviderResult<User>;
}

#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn get_flag(&self, key: &str) -> ProviderResult<Option<String>>;
}

/// The full set of collaborators one booking interaction needs
#[derive(Clone)]
pub struct Providers {
    pub catalog: Arc<dyn CatalogProvider>,
    pub reservations: Arc<dyn ReservationProvider>,
    pub referrals: Arc<dyn ReferralProvider>,
    pub auth: Arc<dyn AuthProvider>,
    pub settings: Arc<dyn SettingsProvider>,
}

impl Providers {
    /// Same collaborators with a different identity source
    pub fn with_auth(&self, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            auth,
            ..self.clone()
        }
    }
}

/// Resolves the identity source for one request
pub trait IdentitySource: Send + Sync {
    fn auth_for(&self, user_id: Option<Uuid>) -> Arc<dyn AuthProvider>;
}
