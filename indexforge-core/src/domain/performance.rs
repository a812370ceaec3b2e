use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One point of an index value series, keyed by (index name, date).
///
/// Produced downstream from composition weights and price series; consumed
/// here as a read model for backtesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPerformancePoint {
    pub index_name: String,
    pub date: NaiveDate,
    pub value: f64,
    /// None on the first point of a series.
    pub daily_return: Option<f64>,
}
