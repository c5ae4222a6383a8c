//! Database queries for the booking catalog, reservations and profiles

use sqlx::PgPool;
use uuid::Uuid;

use crate::booking::providers::{ProviderError, ProviderResult};
use crate::models::{
    AgriculturalPackageRow, Contract, FarmSummary, InfluencerPartner, InvestmentPackageRow,
    NewReservation, NewUser, Package, Reservation, ReservationPatch, ReservationRow, UsageType,
    User,
};

const RESERVATION_COLUMNS: &str = r#"
    id, farm_id, contract_id, duration_years, bonus_years, bonus_months,
    total_trees, total_price, status, guest_id, user_id, payment_deadline,
    influencer_code, created_at
"#;

fn to_db_int(value: u32, field: &str) -> ProviderResult<i32> {
    i32::try_from(value).map_err(|_| ProviderError::Data(format!("{} out of range: {}", field, value)))
}

fn to_db_opt(value: Option<u32>, field: &str) -> ProviderResult<Option<i32>> {
    value.map(|v| to_db_int(v, field)).transpose()
}

fn into_reservation(row: ReservationRow) -> ProviderResult<Reservation> {
    Reservation::try_from(row).map_err(ProviderError::Data)
}

/// Farms open for booking, by name
pub async fn list_farms(pool: &PgPool) -> ProviderResult<Vec<FarmSummary>> {
    let farms = sqlx::query_as::<_, FarmSummary>(
        r#"
        SELECT id, name, location, available_trees, description
        FROM farms
        WHERE is_active = true
        ORDER BY name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(farms)
}

pub async fn get_farm_summary(pool: &PgPool, farm_id: Uuid) -> ProviderResult<Option<FarmSummary>> {
    let farm = sqlx::query_as::<_, FarmSummary>(
        r#"
        SELECT id, name, location, available_trees, description
        FROM farms
        WHERE id = $1
        "#,
    )
    .bind(farm_id)
    .fetch_optional(pool)
    .await?;

    Ok(farm)
}

/// Contracts a farm offers, shortest first
pub async fn get_farm_contracts(pool: &PgPool, farm_id: Uuid) -> ProviderResult<Vec<Contract>> {
    let contracts = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, farm_id, duration_years, bonus_years, investor_price, farmer_price
        FROM contracts
        WHERE farm_id = $1
        ORDER BY duration_years, id
        "#,
    )
    .bind(farm_id)
    .fetch_all(pool)
    .await?;

    Ok(contracts)
}

pub async fn get_contract(pool: &PgPool, contract_id: Uuid) -> ProviderResult<Option<Contract>> {
    let contract = sqlx::query_as::<_, Contract>(
        r#"
        SELECT id, farm_id, duration_years, bonus_years, investor_price, farmer_price
        FROM contracts
        WHERE id = $1
        "#,
    )
    .bind(contract_id)
    .fetch_optional(pool)
    .await?;

    Ok(contract)
}

/// Active packages for a usage type in catalog order
pub async fn list_active_packages(pool: &PgPool, usage: UsageType) -> ProviderResult<Vec<Package>> {
    let packages = match usage {
        UsageType::Personal => sqlx::query_as::<_, AgriculturalPackageRow>(
            r#"
            SELECT id, contract_id, name, price_per_tree, min_trees,
                   bonus_free_years, is_featured, sort_order
            FROM agricultural_packages
            WHERE is_active = true
            ORDER BY sort_order, name
            "#,
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| Package::Agricultural(row.into()))
        .collect(),
        UsageType::Investment => sqlx::query_as::<_, InvestmentPackageRow>(
            r#"
            SELECT id, contract_id, name, price_per_tree, min_trees,
                   bonus_free_years, is_featured, sort_order,
                   tree_increment,
                   COALESCE(quick_select_options, '{}') AS quick_select_options
            FROM investment_packages
            WHERE is_active = true
            ORDER BY sort_order, name
            "#,
        )
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| Package::Investment(row.into()))
        .collect(),
    };

    Ok(packages)
}

pub async fn insert_reservation(pool: &PgPool, payload: &NewReservation) -> ProviderResult<Reservation> {
    let sql = format!(
        r#"
        INSERT INTO reservations (
            id, farm_id, contract_id, duration_years, bonus_years, bonus_months,
            total_trees, total_price, status, guest_id, user_id, payment_deadline,
            influencer_code
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {}
        "#,
        RESERVATION_COLUMNS
    );

    let row = sqlx::query_as::<_, ReservationRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(payload.farm_id)
        .bind(payload.contract_id)
        .bind(to_db_int(payload.duration_years, "duration_years")?)
        .bind(to_db_int(payload.bonus_years, "bonus_years")?)
        .bind(to_db_int(payload.bonus_months, "bonus_months")?)
        .bind(to_db_int(payload.total_trees, "total_trees")?)
        .bind(payload.total_price)
        .bind(payload.status.as_str())
        .bind(payload.guest_id)
        .bind(payload.user_id)
        .bind(payload.payment_deadline)
        .bind(payload.influencer_code.as_deref())
        .fetch_one(pool)
        .await?;

    into_reservation(row)
}

/// Apply a partial update; unset fields keep their stored value
pub async fn update_reservation(
    pool: &PgPool,
    id: Uuid,
    patch: &ReservationPatch,
) -> ProviderResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE reservations SET
            status = COALESCE($2, status),
            contract_id = COALESCE($3, contract_id),
            duration_years = COALESCE($4, duration_years),
            bonus_years = COALESCE($5, bonus_years),
            bonus_months = COALESCE($6, bonus_months),
            total_trees = COALESCE($7, total_trees),
            total_price = COALESCE($8, total_price),
            payment_deadline = CASE WHEN $9::boolean THEN $10 ELSE payment_deadline END,
            influencer_code = CASE WHEN $11::boolean THEN $12 ELSE influencer_code END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(patch.status.map(|s| s.as_str()))
    .bind(patch.contract_id)
    .bind(to_db_opt(patch.duration_years, "duration_years")?)
    .bind(to_db_opt(patch.bonus_years, "bonus_years")?)
    .bind(to_db_opt(patch.bonus_months, "bonus_months")?)
    .bind(to_db_opt(patch.total_trees, "total_trees")?)
    .bind(patch.total_price)
    .bind(patch.payment_deadline.is_some())
    .bind(patch.payment_deadline.flatten())
    .bind(patch.influencer_code.is_some())
    .bind(patch.influencer_code.as_ref().and_then(|c| c.as_deref()))
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProviderError::NotFound(format!("Reservation {}", id)));
    }
    Ok(())
}

/// Move a guest reservation to a user. Re-linking to the same user is a no-op.
pub async fn link_reservation(pool: &PgPool, id: Uuid, user_id: Uuid) -> ProviderResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE reservations
        SET user_id = $2, guest_id = NULL, updated_at = NOW()
        WHERE id = $1 AND (user_id IS NULL OR user_id = $2)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ProviderError::NotFound(format!(
            "Unclaimed reservation {}",
            id
        )));
    }
    Ok(())
}

pub async fn find_partner_by_code(
    pool: &PgPool,
    code: &str,
) -> ProviderResult<Option<InfluencerPartner>> {
    let partner = sqlx::query_as::<_, InfluencerPartner>(
        r#"
        SELECT id, name, code, is_active, bonus_months
        FROM influencer_partners
        WHERE upper(code) = upper($1)
        LIMIT 1
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(partner)
}

pub async fn get_setting(pool: &PgPool, key: &str) -> ProviderResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>(
        r#"
        SELECT value
        FROM app_settings
        WHERE key = $1
        "#,
    )
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(value)
}

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> ProviderResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, first_name, last_name, phone
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn insert_profile(pool: &PgPool, fields: &NewUser) -> ProviderResult<User> {
    let result = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO profiles (id, email, first_name, last_name, phone)
        VALUES ($1, lower($2), $3, $4, $5)
        RETURNING id, email, first_name, last_name, phone
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(fields.email.trim())
    .bind(fields.first_name.as_deref())
    .bind(fields.last_name.as_deref())
    .bind(fields.phone.as_deref())
    .fetch_one(pool)
    .await;

    match result {
        Ok(user) => Ok(user),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ProviderError::Data(
            "An account with this email already exists".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}
