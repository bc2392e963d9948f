pub mod entry;
pub mod quota;
pub mod score_record;

pub use entry::{DesignCategory, Entry, Product, UsedProduct};
pub use quota::{MonthKey, QuotaRecord, QuotaStatus};
pub use score_record::{ScoreMetric, ScoreRecord, SubScores};
