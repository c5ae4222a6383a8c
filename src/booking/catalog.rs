//! Catalog resolution for a checkout.
//!
//! Loads a farm with its embedded contracts and the active packages for a
//! usage type. Also resolves the contract behind a selected package.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::providers::{CatalogProvider, ProviderError, ProviderResult};
use super::selection::{ContractLookupTicket, Selection};
use crate::cache::AppCache;
use crate::models::{Contract, Farm, FarmSummary, Package, UsageType};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Farm {0} not found")]
    FarmNotFound(Uuid),

    #[error("Package {0} is not offered for this farm")]
    PackageNotFound(Uuid),

    #[error("Contract {0} is not offered for this farm")]
    ContractNotFound(Uuid),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// What a farm offers for one usage type
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub farm: Farm,
    pub usage: UsageType,
    pub packages: Vec<Package>,
}

impl Catalog {
    pub fn featured_package(&self) -> Option<&Package> {
        self.packages.iter().find(|p| p.is_featured())
    }

    pub fn package(&self, package_id: Uuid) -> Option<&Package> {
        self.packages.iter().find(|p| p.id() == package_id)
    }

    pub fn contract(&self, contract_id: Uuid) -> Option<&Contract> {
        self.farm.contract(contract_id)
    }
}

#[derive(Clone)]
pub struct CatalogResolver {
    provider: Arc<dyn CatalogProvider>,
    cache: Option<AppCache>,
}

impl CatalogResolver {
    pub fn new(provider: Arc<dyn CatalogProvider>) -> Self {
        Self {
            provider,
            cache: None,
        }
    }

    /// Serve farm and package listings through the shared cache
    pub fn with_cache(mut self, cache: AppCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub async fn farms(&self) -> ProviderResult<Arc<Vec<FarmSummary>>> {
        match &self.cache {
            Some(cache) => cache.farms(self.provider.as_ref()).await,
            None => Ok(Arc::new(self.provider.list_farms().await?)),
        }
    }

    pub async fn packages(&self, usage: UsageType) -> ProviderResult<Arc<Vec<Package>>> {
        match &self.cache {
            Some(cache) => cache.packages(self.provider.as_ref(), usage).await,
            None => Ok(Arc::new(self.provider.list_active_packages(usage).await?)),
        }
    }

    /// Load the farm and the packages for `usage`
    pub async fn load(&self, farm_id: Uuid, usage: UsageType) -> Result<Catalog, CatalogError> {
        let farm = self
            .provider
            .get_farm(farm_id)
            .await?
            .ok_or(CatalogError::FarmNotFound(farm_id))?;
        let packages = self.packages(usage).await?;

        debug!(
            "Loaded catalog for farm {}: {} {} packages",
            farm_id,
            packages.len(),
            usage.as_str()
        );
        Ok(Catalog {
            farm,
            usage,
            packages: packages.as_ref().clone(),
        })
    }

    /// Fetch the contract a ticket asks for
    pub async fn lookup_contract(
        &self,
        ticket: ContractLookupTicket,
    ) -> ProviderResult<Option<Contract>> {
        self.provider.get_contract(ticket.contract_id).await
    }

    /// Fresh selection for a catalog, with the featured package resolved
    pub async fn open_selection(&self, catalog: &Catalog) -> Selection {
        let mut selection = Selection::new(&catalog.farm, catalog.usage);
        if let Some(ticket) = selection.set_usage_type(catalog.usage, &catalog.packages) {
            let result = self.lookup_contract(ticket).await;
            selection.complete_contract_lookup(ticket, result);
        }
        selection
    }
}
