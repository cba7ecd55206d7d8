//! Tariff domain module.
//!
//! Tariff definitions and the pure calculation rules built on them: tier
//! allocation, fee aggregation and late-payment penalties. No IO; every
//! function takes the tariff version and customer type explicitly.

pub mod catalog;
pub mod fees;
pub mod model;
pub mod normalize;
pub mod penalty;
pub mod tier;

pub use catalog::{resolve_in, TariffCatalog};
pub use fees::{compute as compute_charges, BillCharges, FeeOptions};
pub use model::{
    AdditionalFee, CustomerType, FeeKind, MeterSize, PenaltyTier, TariffVersion, Tier, TierLimit,
    TierMode,
};
pub use normalize::RawTariff;
pub use penalty::{penalty_amount, penalty_rate};
pub use tier::{allocate, TierAllocation, TierCharge};
