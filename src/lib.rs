//! Booking service for tree adoption and investment.
//!
//! Farms offer contracts and packages. Visitors pick a package, a contract
//! and a tree count, optionally apply a referral code, then move through
//! review, registration and payment. Every step is served as JSON.

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

pub mod booking;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

use booking::{CatalogResolver, CheckoutRegistry, IdentitySource, Providers};
use cache::AppCache;
use config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: AppCache,
    pub resolver: CatalogResolver,
    pub providers: Providers,
    pub identity: Arc<dyn IdentitySource>,
    pub checkouts: CheckoutRegistry,
    pub config: Arc<Config>,
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", booking::router())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
