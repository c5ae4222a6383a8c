//! Booking flow state machine.
//!
//! Steps run `review -> (registration)? -> payment -> success`. When the
//! customer picks flexible payment, the flow ends at `flexible_success`
//! instead. [`transition`] is the pure step function. [`BookingFlow`] drives
//! it and talks to the reservation and auth providers at each commit point.
//!
//! One flow owns at most one reservation. Confirming the review again after
//! going back reuses the reservation instead of creating another one.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::providers::{ProviderError, Providers, SettingsProvider};
use super::selection::{CommitSummary, Selection, ValidationError};
use super::settings::FlowSettings;
use crate::models::{NewReservation, NewUser, ReservationPatch, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    Review,
    Registration,
    Payment,
    Success,
    FlexibleSuccess,
}

impl FlowStep {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowStep::Success | FlowStep::FlexibleSuccess)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Immediate,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowEvent {
    ReviewConfirmed {
        mode: PaymentMode,
        authenticated: bool,
    },
    Registered,
    PaymentSucceeded,
    Back,
}

impl FlowEvent {
    fn name(&self) -> &'static str {
        match self {
            FlowEvent::ReviewConfirmed { .. } => "review_confirmed",
            FlowEvent::Registered => "registered",
            FlowEvent::PaymentSucceeded => "payment_succeeded",
            FlowEvent::Back => "back",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowState {
    pub step: FlowStep,
    /// Chosen at review and applied once identity is known
    pub payment_mode: Option<PaymentMode>,
    history: Vec<FlowStep>,
}

impl FlowState {
    pub fn new() -> Self {
        Self {
            step: FlowStep::Review,
            payment_mode: None,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[FlowStep] {
        &self.history
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot apply {event} at step {from:?}")]
pub struct TransitionError {
    pub from: FlowStep,
    pub event: &'static str,
}

fn step_after_identity(mode: PaymentMode) -> FlowStep {
    match mode {
        PaymentMode::Immediate => FlowStep::Payment,
        PaymentMode::Flexible => FlowStep::FlexibleSuccess,
    }
}

/// Pure transition function
pub fn transition(state: &FlowState, event: FlowEvent) -> Result<FlowState, TransitionError> {
    let invalid = || TransitionError {
        from: state.step,
        event: event.name(),
    };
    let mut next = state.clone();

    match (state.step, event) {
        (
            FlowStep::Review,
            FlowEvent::ReviewConfirmed {
                mode,
                authenticated,
            },
        ) => {
            next.payment_mode = Some(mode);
            next.history.push(FlowStep::Review);
            next.step = if authenticated {
                step_after_identity(mode)
            } else {
                FlowStep::Registration
            };
        }
        (FlowStep::Registration, FlowEvent::Registered) => {
            let mode = state.payment_mode.ok_or_else(invalid)?;
            next.history.push(FlowStep::Registration);
            next.step = step_after_identity(mode);
        }
        (FlowStep::Payment, FlowEvent::PaymentSucceeded) => {
            next.history.push(FlowStep::Payment);
            next.step = FlowStep::Success;
        }
        (FlowStep::Review, FlowEvent::Back) => {}
        (step, FlowEvent::Back) if !step.is_terminal() => {
            next.step = next.history.pop().unwrap_or(FlowStep::Review);
        }
        _ => return Err(invalid()),
    }

    Ok(next)
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Could not save your reservation: {0}")]
    Commitment(#[source] ProviderError),

    #[error("Could not create your account: {0}")]
    Registration(#[source] ProviderError),

    #[error("Could not confirm who is signed in: {0}")]
    Identity(#[source] ProviderError),

    #[error("No reservation exists for this booking")]
    MissingReservation,
}

/// Handed to the completion callback once payment succeeds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingReceipt {
    pub flow_id: Uuid,
    pub reservation_id: Uuid,
    pub user_id: Option<Uuid>,
    pub payment_reference: String,
}

/// One checkout attempt's progress through the steps
#[derive(Debug, Clone)]
pub struct BookingFlow {
    id: Uuid,
    state: FlowState,
    settings: FlowSettings,
    reservation_id: Option<Uuid>,
    guest_id: Option<Uuid>,
    user_id: Option<Uuid>,
    pending_link: Option<Uuid>,
}

impl BookingFlow {
    pub fn new(settings: FlowSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: FlowState::new(),
            settings,
            reservation_id: None,
            guest_id: None,
            user_id: None,
            pending_link: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn step(&self) -> FlowStep {
        self.state.step
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn settings(&self) -> FlowSettings {
        self.settings
    }

    pub fn reservation_id(&self) -> Option<Uuid> {
        self.reservation_id
    }

    pub fn guest_id(&self) -> Option<Uuid> {
        self.guest_id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn has_pending_link(&self) -> bool {
        self.pending_link.is_some()
    }

    /// Reload gating settings; failures keep the current values
    pub async fn refresh_settings(&mut self, provider: &dyn SettingsProvider) {
        self.settings = FlowSettings::load(provider, self.settings).await;
    }

    pub fn apply_settings(&mut self, settings: FlowSettings) {
        self.settings = settings;
    }

    /// Commit the reviewed selection.
    ///
    /// Creates the reservation on first confirmation, or patches the existing
    /// one with the current totals and referral. Then routes to registration,
    /// payment or flexible success. A commitment failure, or a failure to read
    /// the signed-in user, leaves the flow at review.
    pub async fn confirm_review(
        &mut self,
        selection: &Selection,
        mode: PaymentMode,
        providers: &Providers,
    ) -> Result<FlowStep, FlowError> {
        if self.state.step != FlowStep::Review {
            if self.reservation_id.is_some() && !self.state.step.is_terminal() {
                debug!("Flow {}: ignoring repeated review confirmation", self.id);
                return Ok(self.state.step);
            }
            return Err(TransitionError {
                from: self.state.step,
                event: "review_confirmed",
            }
            .into());
        }

        let summary = selection.validate_for_commit()?;
        if mode == PaymentMode::Flexible && !self.settings.flexible_payment_enabled {
            return Err(ValidationError::FlexiblePaymentUnavailable.into());
        }

        // A signed-in user must never be booked as a guest
        let current_user = providers
            .auth
            .current_user()
            .await
            .map_err(FlowError::Identity)?
            .map(|u| u.id);
        let user_id = current_user.or(self.user_id);

        match self.reservation_id {
            Some(reservation_id) => {
                let patch = self.reconfirm_patch(&summary, mode);
                providers
                    .reservations
                    .update_reservation(reservation_id, patch)
                    .await
                    .map_err(FlowError::Commitment)?;
                debug!("Flow {}: reservation {} updated on re-confirm", self.id, reservation_id);
            }
            None => {
                let guest_id = match user_id {
                    Some(_) => None,
                    None => Some(self.guest_id.unwrap_or_else(Uuid::new_v4)),
                };
                let payload = self.new_reservation(&summary, mode, guest_id, user_id);
                let reservation = providers
                    .reservations
                    .create_reservation(payload)
                    .await
                    .map_err(FlowError::Commitment)?;
                info!(
                    "Flow {}: reservation {} created ({} trees, total {})",
                    self.id, reservation.id, summary.quote.tree_count, summary.quote.total_price
                );
                self.reservation_id = Some(reservation.id);
                self.guest_id = guest_id;
            }
        }

        self.user_id = user_id;
        self.state = transition(
            &self.state,
            FlowEvent::ReviewConfirmed {
                mode,
                authenticated: user_id.is_some(),
            },
        )?;
        self.after_step_change(providers).await;
        Ok(self.state.step)
    }

    /// Finish registration, re-own the guest reservation and route on.
    ///
    /// A failed re-link is logged and retried at payment. It does not stop the flow.
    pub async fn register(
        &mut self,
        fields: NewUser,
        providers: &Providers,
    ) -> Result<FlowStep, FlowError> {
        if self.state.step != FlowStep::Registration {
            return Err(TransitionError {
                from: self.state.step,
                event: "registered",
            }
            .into());
        }
        let reservation_id = self.reservation_id.ok_or(FlowError::MissingReservation)?;

        let user_id = match self.user_id {
            Some(user_id) => user_id,
            None => {
                fields
                    .validate()
                    .map_err(ValidationError::InvalidRegistration)?;
                let user = providers
                    .auth
                    .register_user(fields)
                    .await
                    .map_err(FlowError::Registration)?;
                info!("Flow {}: registered user {}", self.id, user.id);
                user.id
            }
        };
        self.user_id = Some(user_id);

        if self.guest_id.is_some() {
            self.link_reservation(reservation_id, user_id, providers).await;
        }

        self.state = transition(&self.state, FlowEvent::Registered)?;
        self.after_step_change(providers).await;
        Ok(self.state.step)
    }

    /// Record a successful payment and invoke `on_complete`
    pub async fn complete_payment<F>(
        &mut self,
        payment_reference: &str,
        providers: &Providers,
        on_complete: F,
    ) -> Result<BookingReceipt, FlowError>
    where
        F: FnOnce(&BookingReceipt),
    {
        if self.state.step != FlowStep::Payment {
            return Err(TransitionError {
                from: self.state.step,
                event: "payment_succeeded",
            }
            .into());
        }
        let reservation_id = self.reservation_id.ok_or(FlowError::MissingReservation)?;

        if let Some(user_id) = self.pending_link {
            self.link_reservation(reservation_id, user_id, providers).await;
        }

        if let Err(e) = providers
            .reservations
            .update_reservation(reservation_id, ReservationPatch::status(ReservationStatus::Paid))
            .await
        {
            error!(
                "Flow {}: payment {} succeeded but reservation {} was not marked paid: {}",
                self.id, payment_reference, reservation_id, e
            );
        }

        self.state = transition(&self.state, FlowEvent::PaymentSucceeded)?;
        let receipt = BookingReceipt {
            flow_id: self.id,
            reservation_id,
            user_id: self.user_id,
            payment_reference: payment_reference.to_string(),
        };
        info!("Flow {}: booking complete for reservation {}", self.id, reservation_id);
        on_complete(&receipt);
        Ok(receipt)
    }

    /// Return to the previous step. The reservation is kept.
    pub fn back(&mut self) -> Result<FlowStep, TransitionError> {
        self.state = transition(&self.state, FlowEvent::Back)?;
        Ok(self.state.step)
    }

    async fn link_reservation(&mut self, reservation_id: Uuid, user_id: Uuid, providers: &Providers) {
        match providers
            .reservations
            .link_reservation_to_user(reservation_id, user_id)
            .await
        {
            Ok(()) => {
                info!("Flow {}: reservation {} linked to user {}", self.id, reservation_id, user_id);
                self.guest_id = None;
                self.pending_link = None;
            }
            Err(e) => {
                warn!(
                    "Flow {}: failed to link reservation {} to user {}: {}",
                    self.id, reservation_id, user_id, e
                );
                self.pending_link = Some(user_id);
            }
        }
    }

    async fn after_step_change(&self, providers: &Providers) {
        if self.state.step != FlowStep::Payment {
            return;
        }
        let Some(reservation_id) = self.reservation_id else {
            return;
        };
        if let Err(e) = providers
            .reservations
            .update_reservation(
                reservation_id,
                ReservationPatch::status(ReservationStatus::WaitingForPayment),
            )
            .await
        {
            warn!(
                "Flow {}: could not mark reservation {} waiting for payment: {}",
                self.id, reservation_id, e
            );
        }
    }

    fn status_and_deadline(
        &self,
        mode: PaymentMode,
    ) -> (ReservationStatus, Option<chrono::DateTime<Utc>>) {
        match mode {
            PaymentMode::Immediate => (ReservationStatus::Pending, None),
            PaymentMode::Flexible => (
                ReservationStatus::Temporary,
                Some(Utc::now() + Duration::days(i64::from(self.settings.grace_period_days))),
            ),
        }
    }

    fn new_reservation(
        &self,
        summary: &CommitSummary,
        mode: PaymentMode,
        guest_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> NewReservation {
        let (status, payment_deadline) = self.status_and_deadline(mode);
        NewReservation {
            farm_id: summary.farm_id,
            contract_id: summary.contract_id,
            duration_years: summary.quote.duration_years,
            bonus_years: summary.quote.bonus.years(),
            bonus_months: summary.quote.bonus.months(),
            total_trees: summary.quote.tree_count,
            total_price: summary.quote.total_price,
            status,
            guest_id,
            user_id,
            payment_deadline,
            influencer_code: summary.influencer_code.clone(),
        }
    }

    fn reconfirm_patch(&self, summary: &CommitSummary, mode: PaymentMode) -> ReservationPatch {
        let (status, payment_deadline) = self.status_and_deadline(mode);
        ReservationPatch {
            status: Some(status),
            contract_id: Some(summary.contract_id),
            duration_years: Some(summary.quote.duration_years),
            bonus_years: Some(summary.quote.bonus.years()),
            bonus_months: Some(summary.quote.bonus.months()),
            total_trees: Some(summary.quote.tree_count),
            total_price: Some(summary.quote.total_price),
            payment_deadline: Some(payment_deadline),
            influencer_code: Some(summary.influencer_code.clone()),
        }
    }
}
