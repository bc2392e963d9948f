pub mod connection;
pub(crate) mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{
    DesignCategory, Entry, MonthKey, Product, QuotaRecord, QuotaStatus, ScoreMetric, ScoreRecord,
    SubScores, UsedProduct,
};
pub use repositories::BillingOutcome;
