//! Deterministic synthetic universe for benches, tests and CLI demos.
//!
//! Same seed, same universe. Values are drawn from ranges that look like a
//! small-to-large cap thematic universe; a few entries are deliberately left
//! incomplete so the filter has something to exclude.

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::{Company, FundamentalsSnapshot, UniverseEntry, UniverseSnapshot};

const SEGMENTS: [&str; 6] = [
    "Launch",
    "Satellites",
    "Ground Systems",
    "Earth Observation",
    "Components",
    "Space Services",
];

/// Generate `count` companies. Every 17th entry is missing its price.
pub fn synthetic_universe(count: usize, as_of: NaiveDate, seed: u64) -> UniverseSnapshot {
    let mut rng = StdRng::seed_from_u64(seed);
    let entries = (0..count)
        .map(|i| {
            let ticker = format!("SYN{i:04}");
            let first = SEGMENTS[rng.gen_range(0..SEGMENTS.len())];
            let second = SEGMENTS[rng.gen_range(0..SEGMENTS.len())];
            let company = Company::new(ticker.clone(), format!("Synthetic {ticker}"))
                .with_segment_revenue_pct(rng.gen_range(5.0..=100.0))
                .with_segments([first, second]);

            // log-uniform market cap between $50M and $500B
            let market_cap = 10f64.powf(rng.gen_range(7.7..11.7));
            let price = rng.gen_range(2.0..400.0);
            let fundamentals = FundamentalsSnapshot {
                date: as_of,
                revenue: Some(market_cap * rng.gen_range(0.05..0.5)),
                revenue_growth_yoy: Some(rng.gen_range(-60.0..250.0)),
                revenue_growth_3y_cagr: Some(rng.gen_range(-30.0..120.0)),
                market_cap: Some(market_cap),
                price: (i % 17 != 16).then_some(price),
                volume: Some(rng.gen_range(5e4..5e7)),
            };
            UniverseEntry {
                company,
                fundamentals: Some(fundamentals),
            }
        })
        .collect();
    UniverseSnapshot::new(as_of, entries)
}
