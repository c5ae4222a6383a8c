//! Domain models shared by the booking engine and the database layer

pub mod contract;
pub mod farm;
pub mod package;
pub mod partner;
pub mod reservation;
pub mod user;

pub use contract::Contract;
pub use farm::{Farm, FarmSummary};
pub use package::{
    AgriculturalPackage, AgriculturalPackageRow, InvestmentPackage, InvestmentPackageRow, Package,
    PackageTerms, UsageType,
};
pub use partner::InfluencerPartner;
pub use reservation::{NewReservation, Reservation, ReservationPatch, ReservationRow, ReservationStatus};
pub use user::{NewUser, User};

/// Convert a database integer into a count, treating negatives as zero
pub(crate) fn non_negative(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}
