pub mod entries;
pub mod quotas;
pub mod score_records;

pub use quotas::BillingOutcome;
