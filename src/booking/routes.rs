//! HTTP routes for the booking API

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::checkout::{CheckoutSession, SharedCheckout, TreeChange};
use super::providers::Providers;
use super::referral::ReferralOutcome;
use super::requests::{
    ApplyReferralRequest, CatalogQuery, ChangeUsageRequest, ConfirmRequest,
    CreateCheckoutRequest, NavigationRequest, PaymentRequest, SelectContractRequest,
    SelectPackageRequest,
};
use super::responses::{
    CatalogResponse, CheckoutResponse, NavigationResponse, PaymentResponse,
    ReferralCheckResponse,
};
use super::settings::FlowSettings;
use crate::cache::CacheStats;
use crate::error::{AppError, Result};
use crate::models::{FarmSummary, NewUser};
use crate::AppState;

/// Header carrying the signed-in user's profile id
pub const USER_HEADER: &str = "x-user-id";

/// Create the booking router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/farms", get(list_farms))
        .route("/farms/:farm_id/catalog", get(farm_catalog))
        .route("/checkout", post(create_checkout))
        .route("/checkout/:id", get(get_checkout))
        .route("/checkout/:id/usage", post(change_usage))
        .route("/checkout/:id/package", post(select_package))
        .route("/checkout/:id/contract", post(select_contract))
        .route("/checkout/:id/trees", post(change_trees))
        .route(
            "/checkout/:id/referral",
            post(apply_referral).delete(clear_referral),
        )
        .route("/checkout/:id/navigation", post(navigation))
        .route("/checkout/:id/confirm", post(confirm))
        .route("/checkout/:id/register", post(register))
        .route("/checkout/:id/payment", post(payment))
        .route("/checkout/:id/back", post(back))
        .route("/cache/stats", get(cache_stats))
        .route("/cache/invalidate", post(invalidate_cache))
}

fn user_id(headers: &HeaderMap) -> Result<Option<Uuid>> {
    match headers.get(USER_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(Some)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid {} header", USER_HEADER))),
    }
}

fn providers_for(state: &AppState, headers: &HeaderMap) -> Result<Providers> {
    let auth = state.identity.auth_for(user_id(headers)?);
    Ok(state.providers.with_auth(auth))
}

async fn find_checkout(state: &AppState, id: Uuid) -> Result<SharedCheckout> {
    state
        .checkouts
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Checkout {} not found", id)))
}

/// Finished checkouts leave the registry; the response already carries their state
async fn release_if_finished(state: &AppState, session: &CheckoutSession) {
    if session.flow().step().is_terminal() {
        state.checkouts.remove(session.id()).await;
        info!("Checkout {} finished", session.id());
    }
}

fn view(state: &AppState, session: &CheckoutSession) -> Json<CheckoutResponse> {
    Json(CheckoutResponse::build(session, &state.config.currency))
}

async fn list_farms(State(state): State<AppState>) -> Result<Json<Vec<FarmSummary>>> {
    let farms = state.resolver.farms().await?;
    Ok(Json(farms.as_ref().clone()))
}

async fn farm_catalog(
    State(state): State<AppState>,
    Path(farm_id): Path<Uuid>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>> {
    let catalog = state.resolver.load(farm_id, query.usage).await?;
    Ok(Json(catalog.into()))
}

async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    let mut session = CheckoutSession::open(
        &state.resolver,
        state.providers.referrals.clone(),
        state.config.default_referral_bonus,
        state.config.flow_defaults(),
        req.farm_id,
        req.usage,
    )
    .await?;

    if let Some(code) = req.referral_code.as_deref().filter(|c| !c.trim().is_empty()) {
        let outcome = session.apply_referral(code).await?;
        if !outcome.is_valid() {
            debug!("Ignoring landing referral code {}: {}", code, outcome.message());
        }
    }

    let response = CheckoutResponse::build(&session, &state.config.currency);
    let shared = state.checkouts.insert(session).await;
    info!("Opened checkout {} for farm {}", response.id, req.farm_id);

    // Settings are read in the background; the defaults apply until then
    let provider = state.providers.settings.clone();
    let defaults = state.config.flow_defaults();
    tokio::spawn(async move {
        let settings = FlowSettings::load(provider.as_ref(), defaults).await;
        shared.lock().await.set_settings(settings);
    });

    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_checkout(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let session = shared.lock().await;
    Ok(view(&state, &session))
}

async fn change_usage(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeUsageRequest>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.change_usage(&state.resolver, req.usage).await?;
    Ok(view(&state, &session))
}

/// The contract lookup runs without holding the checkout lock so a newer
/// selection can supersede it.
async fn select_package(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectPackageRequest>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let ticket = shared.lock().await.begin_package(req.package_id)?;

    let result = state.resolver.lookup_contract(ticket).await;

    let mut session = shared.lock().await;
    let resolution = session.finish_package(ticket, result);
    debug!("Checkout {} package {}: {:?}", id, req.package_id, resolution);
    Ok(view(&state, &session))
}

async fn select_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectContractRequest>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.select_contract(req.contract_id)?;
    Ok(view(&state, &session))
}

async fn change_trees(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(change): Json<TreeChange>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.change_trees(change)?;
    Ok(view(&state, &session))
}

async fn apply_referral(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyReferralRequest>,
) -> Result<Json<ReferralCheckResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    let outcome = session.apply_referral(&req.code).await?;
    if let ReferralOutcome::Valid(referral) = &outcome {
        info!("Checkout {} using referral code {}", id, referral.code);
    }
    let checkout = CheckoutResponse::build(&session, &state.config.currency);
    Ok(Json(ReferralCheckResponse::new(&outcome, checkout)))
}

async fn clear_referral(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.clear_referral().await?;
    Ok(view(&state, &session))
}

async fn navigation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<NavigationRequest>,
) -> Result<Json<NavigationResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    let referral_cleared = session.handle_navigation(req.kind).await?;
    Ok(Json(NavigationResponse {
        referral_cleared,
        checkout: CheckoutResponse::build(&session, &state.config.currency),
    }))
}

async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<CheckoutResponse>> {
    let providers = providers_for(&state, &headers)?;
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.confirm(req.payment_mode, &providers).await?;
    let response = view(&state, &session);
    release_if_finished(&state, &session).await;
    Ok(response)
}

async fn register(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(fields): Json<NewUser>,
) -> Result<Json<CheckoutResponse>> {
    let providers = providers_for(&state, &headers)?;
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.register(fields, &providers).await?;
    Ok(view(&state, &session))
}

async fn payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>> {
    let providers = providers_for(&state, &headers)?;
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    let receipt = session.pay(&req.payment_reference, &providers).await?;
    let checkout = CheckoutResponse::build(&session, &state.config.currency);
    release_if_finished(&state, &session).await;
    Ok(Json(PaymentResponse { receipt, checkout }))
}

async fn back(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CheckoutResponse>> {
    let shared = find_checkout(&state, id).await?;
    let mut session = shared.lock().await;
    session.back().map_err(|e| AppError::Conflict(e.to_string()))?;
    Ok(view(&state, &session))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

/// Drop cached listings so the next read goes to the database
async fn invalidate_cache(State(state): State<AppState>) -> StatusCode {
    state.cache.invalidate_all();
    StatusCode::NO_CONTENT
}
