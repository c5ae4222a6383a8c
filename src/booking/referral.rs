//! Influencer referral verification.
//!
//! A verified code lives in a session-scoped store, never in durable
//! storage. It is cleared on explicit reset and on back/forward navigation
//! away from the booking page. It also goes away when the session store
//! itself expires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::calculators::BonusDuration;
use super::providers::{ProviderError, ReferralProvider};
use crate::models::InfluencerPartner;

/// Storage key for the active referral
pub const REFERRAL_SESSION_KEY: &str = "tree_booking.referral";

/// Key/value storage scoped to one browser session
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: String);
    async fn remove(&self, key: &str);
}

/// Session store held in process memory
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
    }

    async fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }
}

/// A verified referral code and when it was activated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralSession {
    pub code: String,
    pub partner_id: Uuid,
    pub partner_name: String,
    pub bonus: BonusDuration,
    pub activated_at: DateTime<Utc>,
}

/// Result of looking up a non-empty code
#[derive(Debug, Clone, PartialEq)]
pub enum ReferralOutcome {
    Valid(ReferralSession),
    NotFound,
    Inactive,
}

impl ReferralOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ReferralOutcome::Valid(_))
    }

    /// Message shown next to the code input
    pub fn message(&self) -> String {
        match self {
            ReferralOutcome::Valid(session) => format!(
                "Code {} applied: {} bonus years and {} bonus months",
                session.code,
                session.bonus.years(),
                session.bonus.months()
            ),
            ReferralOutcome::NotFound => "This referral code does not exist".to_string(),
            ReferralOutcome::Inactive => "This referral code is no longer active".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("Please enter a referral code")]
    EmptyCode,

    #[error("Could not verify referral code: {0}")]
    Provider(#[from] ProviderError),
}

/// How the user left or re-entered the booking page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationKind {
    Navigate,
    Reload,
    BackForward,
}

/// Verifies codes and owns the session-scoped referral state
#[derive(Clone)]
pub struct ReferralVerifier {
    provider: Arc<dyn ReferralProvider>,
    store: Arc<dyn SessionStore>,
    default_bonus: BonusDuration,
}

impl ReferralVerifier {
    pub fn new(
        provider: Arc<dyn ReferralProvider>,
        store: Arc<dyn SessionStore>,
        default_bonus: BonusDuration,
    ) -> Self {
        Self {
            provider,
            store,
            default_bonus,
        }
    }

    /// Verify a code. Empty input is rejected before any lookup.
    ///
    /// Only a found and active code is stored in the session.
    pub async fn verify(&self, code: &str) -> Result<ReferralOutcome, ReferralError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ReferralError::EmptyCode);
        }

        let outcome = match self.provider.verify_code(code).await? {
            None => ReferralOutcome::NotFound,
            Some(partner) if !partner.is_active => ReferralOutcome::Inactive,
            Some(partner) => ReferralOutcome::Valid(self.activate(code, &partner).await),
        };

        debug!("Referral code {} verified: {:?}", code, outcome.is_valid());
        Ok(outcome)
    }

    async fn activate(&self, code: &str, partner: &InfluencerPartner) -> ReferralSession {
        let bonus = partner
            .bonus_months
            .and_then(|m| u32::try_from(m).ok())
            .map(BonusDuration::from_months)
            .unwrap_or(self.default_bonus);

        let session = ReferralSession {
            code: code.to_uppercase(),
            partner_id: partner.id,
            partner_name: partner.name.clone(),
            bonus,
            activated_at: Utc::now(),
        };

        match serde_json::to_string(&session) {
            Ok(value) => self.store.set(REFERRAL_SESSION_KEY, value).await,
            Err(e) => warn!("Failed to store referral session: {}", e),
        }
        info!("Referral code {} activated for partner {}", session.code, partner.id);
        session
    }

    /// The referral active in this session, if any
    pub async fn current(&self) -> Option<ReferralSession> {
        let raw = self.store.get(REFERRAL_SESSION_KEY).await?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Discarding unreadable referral session: {}", e);
                self.store.remove(REFERRAL_SESSION_KEY).await;
                None
            }
        }
    }

    /// Explicit reset
    pub async fn clear(&self) {
        self.store.remove(REFERRAL_SESSION_KEY).await;
    }

    /// Clears the referral on back/forward navigation. Returns whether it did.
    pub async fn handle_navigation(&self, kind: NavigationKind) -> bool {
        if kind != NavigationKind::BackForward {
            return false;
        }
        let had_session = self.store.get(REFERRAL_SESSION_KEY).await.is_some();
        self.clear().await;
        if had_session {
            info!("Referral session cleared after back/forward navigation");
        }
        had_session
    }
}
