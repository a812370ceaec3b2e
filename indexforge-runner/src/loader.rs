//! Universe and price loading for the runner.
//!
//! The universe feed is a flat CSV (one row per company) or a JSON-serialized
//! [`UniverseSnapshot`]. Empty CSV cells are treated as missing values, never
//! as zero, so the filter can record them as insufficient data.
//!
//! Prices are a long-format CSV of daily closes: `date,ticker,close`.

use chrono::NaiveDate;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

use indexforge_core::domain::{Company, FundamentalsSnapshot, UniverseEntry, UniverseSnapshot};

use crate::backtest::PriceHistory;

/// Errors from the loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },
}

/// One universe CSV row, as written by the data pipeline.
#[derive(Debug, Deserialize)]
struct UniverseRow {
    ticker: String,
    #[serde(default)]
    name: String,
    segment_revenue_pct: Option<f64>,
    #[serde(default)]
    segments: String,
    date: Option<NaiveDate>,
    revenue: Option<f64>,
    revenue_growth_yoy: Option<f64>,
    revenue_growth_3y_cagr: Option<f64>,
    market_cap: Option<f64>,
    price: Option<f64>,
    volume: Option<f64>,
}

impl UniverseRow {
    fn into_entry(self, row: usize) -> Result<UniverseEntry, LoadError> {
        let ticker = self.ticker.trim().to_ascii_uppercase();
        if ticker.is_empty() {
            return Err(LoadError::InvalidRow {
                row,
                reason: "empty ticker".into(),
            });
        }
        let name = if self.name.trim().is_empty() {
            ticker.clone()
        } else {
            self.name.trim().to_string()
        };
        let mut company = Company::new(ticker, name).with_segments(
            self.segments
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        );
        company.segment_revenue_pct = self.segment_revenue_pct;

        // Without a date there is no point-in-time snapshot to speak of.
        let fundamentals = self.date.map(|date| FundamentalsSnapshot {
            date,
            revenue: self.revenue,
            revenue_growth_yoy: self.revenue_growth_yoy,
            revenue_growth_3y_cagr: self.revenue_growth_3y_cagr,
            market_cap: self.market_cap,
            price: self.price,
            volume: self.volume,
        });
        Ok(UniverseEntry {
            company,
            fundamentals,
        })
    }
}

/// Parse a universe CSV from any reader.
pub fn parse_universe_csv<R: Read>(reader: R, as_of: NaiveDate) -> Result<UniverseSnapshot, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut entries = Vec::new();
    for (i, record) in rdr.deserialize::<UniverseRow>().enumerate() {
        // Row 1 is the header.
        entries.push(record?.into_entry(i + 2)?);
    }
    tracing::debug!(rows = entries.len(), %as_of, "parsed universe CSV");
    Ok(UniverseSnapshot::new(as_of, entries))
}

pub fn load_universe_csv(path: &Path, as_of: NaiveDate) -> Result<UniverseSnapshot, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_universe_csv(file, as_of)
}

/// Load a JSON-serialized [`UniverseSnapshot`].
pub fn load_universe_json(path: &Path) -> Result<UniverseSnapshot, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Load a universe by file extension: `.json` or anything else as CSV.
pub fn load_universe(path: &Path, as_of: NaiveDate) -> Result<UniverseSnapshot, LoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => load_universe_json(path),
        _ => load_universe_csv(path, as_of),
    }
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    date: NaiveDate,
    ticker: String,
    close: f64,
}

/// Parse long-format daily closes. Non-positive or non-finite closes are
/// rejected.
pub fn parse_prices_csv<R: Read>(reader: R) -> Result<PriceHistory, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut prices = PriceHistory::default();
    for (i, record) in rdr.deserialize::<PriceRow>().enumerate() {
        let row = record?;
        if !row.close.is_finite() || row.close <= 0.0 {
            return Err(LoadError::InvalidRow {
                row: i + 2,
                reason: format!("close must be positive, got {}", row.close),
            });
        }
        prices.insert(&row.ticker.to_ascii_uppercase(), row.date, row.close);
    }
    Ok(prices)
}

pub fn load_prices_csv(path: &Path) -> Result<PriceHistory, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_prices_csv(file)
}
