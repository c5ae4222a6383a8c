//! Reservation models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    WaitingForPayment,
    Paid,
    Cancelled,
    Temporary,
    Confirmed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::WaitingForPayment => "waiting_for_payment",
            ReservationStatus::Paid => "paid",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Temporary => "temporary",
            ReservationStatus::Confirmed => "confirmed",
        }
    }
}

impl std::str::FromStr for ReservationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "waiting_for_payment" => Ok(ReservationStatus::WaitingForPayment),
            "paid" => Ok(ReservationStatus::Paid),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "temporary" => Ok(ReservationStatus::Temporary),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            other => Err(format!("unknown reservation status '{}'", other)),
        }
    }
}

/// Row from `reservations`
#[derive(Debug, Clone, FromRow)]
pub struct ReservationRow {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub contract_id: Uuid,
    pub duration_years: i32,
    pub bonus_years: i32,
    pub bonus_months: i32,
    pub total_trees: i32,
    pub total_price: Decimal,
    pub status: String,
    pub guest_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub influencer_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Durable record of a committed booking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reservation {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub contract_id: Uuid,
    pub duration_years: u32,
    pub bonus_years: u32,
    pub bonus_months: u32,
    pub total_trees: u32,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_price: Decimal,
    pub status: ReservationStatus,
    pub guest_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub influencer_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = String;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            farm_id: row.farm_id,
            contract_id: row.contract_id,
            duration_years: super::non_negative(row.duration_years),
            bonus_years: super::non_negative(row.bonus_years),
            bonus_months: super::non_negative(row.bonus_months),
            total_trees: super::non_negative(row.total_trees),
            total_price: row.total_price,
            status: row.status.parse()?,
            guest_id: row.guest_id,
            user_id: row.user_id,
            payment_deadline: row.payment_deadline,
            influencer_code: row.influencer_code,
            created_at: row.created_at,
        })
    }
}

/// Payload for creating a reservation
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub farm_id: Uuid,
    pub contract_id: Uuid,
    pub duration_years: u32,
    pub bonus_years: u32,
    pub bonus_months: u32,
    pub total_trees: u32,
    pub total_price: Decimal,
    pub status: ReservationStatus,
    pub guest_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub influencer_code: Option<String>,
}

/// Partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservationPatch {
    pub status: Option<ReservationStatus>,
    pub contract_id: Option<Uuid>,
    pub duration_years: Option<u32>,
    pub bonus_years: Option<u32>,
    pub bonus_months: Option<u32>,
    pub total_trees: Option<u32>,
    pub total_price: Option<Decimal>,
    /// `Some(None)` clears the deadline
    pub payment_deadline: Option<Option<DateTime<Utc>>>,
    /// `Some(None)` removes the referral
    pub influencer_code: Option<Option<String>>,
}

impl ReservationPatch {
    pub fn status(status: ReservationStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Apply this patch to an in-memory reservation
    pub fn apply(&self, reservation: &mut Reservation) {
        if let Some(status) = self.status {
            reservation.status = status;
        }
        if let Some(contract_id) = self.contract_id {
            reservation.contract_id = contract_id;
        }
        if let Some(years) = self.duration_years {
            reservation.duration_years = years;
        }
        if let Some(years) = self.bonus_years {
            reservation.bonus_years = years;
        }
        if let Some(months) = self.bonus_months {
            reservation.bonus_months = months;
        }
        if let Some(trees) = self.total_trees {
            reservation.total_trees = trees;
        }
        if let Some(price) = self.total_price {
            reservation.total_price = price;
        }
        if let Some(deadline) = self.payment_deadline {
            reservation.payment_deadline = deadline;
        }
        if let Some(code) = &self.influencer_code {
            reservation.influencer_code = code.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::WaitingForPayment,
            ReservationStatus::Paid,
            ReservationStatus::Cancelled,
            ReservationStatus::Temporary,
            ReservationStatus::Confirmed,
        ] {
            assert_eq!(status.as_str().parse::<ReservationStatus>(), Ok(status));
        }
        assert!("pending_payment".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn test_row_with_unknown_status_is_rejected() {
        let row = ReservationRow {
            id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            duration_years: 5,
            bonus_years: 0,
            bonus_months: 0,
            total_trees: 10,
            total_price: dec!(1500),
            status: "archived".to_string(),
            guest_id: None,
            user_id: None,
            payment_deadline: None,
            influencer_code: None,
            created_at: Utc::now(),
        };
        assert!(Reservation::try_from(row).is_err());
    }

    #[test]
    fn test_patch_leaves_unset_fields() {
        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            duration_years: 5,
            bonus_years: 1,
            bonus_months: 0,
            total_trees: 10,
            total_price: dec!(1500),
            status: ReservationStatus::Pending,
            guest_id: None,
            user_id: None,
            payment_deadline: None,
            influencer_code: Some("TREES".to_string()),
            created_at: Utc::now(),
        };

        ReservationPatch {
            total_trees: Some(20),
            total_price: Some(dec!(3000)),
            ..ReservationPatch::status(ReservationStatus::WaitingForPayment)
        }
        .apply(&mut reservation);

        assert_eq!(reservation.status, ReservationStatus::WaitingForPayment);
        assert_eq!(reservation.total_trees, 20);
        assert_eq!(reservation.total_price, dec!(3000));
        assert_eq!(reservation.duration_years, 5);
        assert_eq!(reservation.influencer_code.as_deref(), Some("TREES"));
    }

    #[test]
    fn test_patch_clears_influencer_code() {
        let mut reservation = Reservation {
            id: Uuid::new_v4(),
            farm_id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            duration_years: 5,
            bonus_years: 3,
            bonus_months: 0,
            total_trees: 10,
            total_price: dec!(1500),
            status: ReservationStatus::Pending,
            guest_id: None,
            user_id: None,
            payment_deadline: None,
            influencer_code: Some("TREES".to_string()),
            created_at: Utc::now(),
        };

        ReservationPatch {
            influencer_code: Some(Some("OTHER".to_string())),
            ..Default::default()
        }
        .apply(&mut reservation);
        assert_eq!(reservation.influencer_code.as_deref(), Some("OTHER"));

        ReservationPatch {
            bonus_years: Some(0),
            influencer_code: Some(None),
            ..Default::default()
        }
        .apply(&mut reservation);
        assert!(reservation.influencer_code.is_none());
        assert_eq!(reservation.bonus_years, 0);
    }
}
