//! Company, fundamentals snapshot, and the immutable universe snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::UniverseHash;

/// A candidate company as seen by the universe feed.
///
/// Identity plus classification output. Point-in-time numbers (market cap,
/// growth, volume) live on [`FundamentalsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub ticker: String,
    pub name: String,
    /// Share of revenue attributable to the index theme (0–100). Supplied by
    /// the external classifier and treated as opaque.
    pub segment_revenue_pct: Option<f64>,
    /// Non-exclusive segment tags (e.g. "Launch", "Satellites").
    #[serde(default)]
    pub segments: BTreeSet<String>,
}

impl Company {
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            name: name.into(),
            segment_revenue_pct: None,
            segments: BTreeSet::new(),
        }
    }

    pub fn with_segment_revenue_pct(mut self, pct: f64) -> Self {
        self.segment_revenue_pct = Some(pct);
        self
    }

    pub fn with_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.segments = segments.into_iter().map(Into::into).collect();
        self
    }
}

/// Point-in-time fundamentals for one company on one date. Append-only:
/// a later snapshot never mutates an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsSnapshot {
    pub date: NaiveDate,
    pub revenue: Option<f64>,
    /// Year-over-year revenue growth in percent (45.0 = +45%).
    pub revenue_growth_yoy: Option<f64>,
    /// Three-year revenue CAGR in percent.
    pub revenue_growth_3y_cagr: Option<f64>,
    pub market_cap: Option<f64>,
    pub price: Option<f64>,
    /// Average daily share volume.
    pub volume: Option<f64>,
}

impl FundamentalsSnapshot {
    /// Average daily dollar volume (price × share volume).
    pub fn dollar_volume(&self) -> Option<f64> {
        Some(self.price? * self.volume?)
    }

    /// Names of fields that are absent or non-finite.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, Option<f64>); 6] = [
            ("revenue", self.revenue),
            ("revenue_growth_yoy", self.revenue_growth_yoy),
            ("revenue_growth_3y_cagr", self.revenue_growth_3y_cagr),
            ("market_cap", self.market_cap),
            ("price", self.price),
            ("volume", self.volume),
        ];
        fields
            .into_iter()
            .filter(|(_, v)| !v.is_some_and(f64::is_finite))
            .map(|(name, _)| name)
            .collect()
    }
}

/// One row of the universe feed: a company and its latest fundamentals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub company: Company,
    pub fundamentals: Option<FundamentalsSnapshot>,
}

/// Immutable universe snapshot handed to a rebalance run.
///
/// Fetched once per run and threaded through every stage; no stage reads
/// live data mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseSnapshot {
    pub as_of: NaiveDate,
    pub entries: Vec<UniverseEntry>,
}

impl UniverseSnapshot {
    pub fn new(as_of: NaiveDate, entries: Vec<UniverseEntry>) -> Self {
        Self { as_of, entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content hash of the snapshot (canonical JSON through BLAKE3).
    pub fn content_hash(&self) -> UniverseHash {
        let json = serde_json::to_vec(self).unwrap_or_default();
        UniverseHash::from_bytes(&json)
    }
}
