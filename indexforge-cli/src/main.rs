//! IndexForge CLI — rebalance, batch, diff, backtest and store commands.
//!
//! Commands:
//! - `calculate` — run one rebalance from a TOML config (or preset) and a universe file
//! - `batch` — run several configs against one universe feed, in parallel
//! - `diff` — compare two compositions (files, or the latest two in a store)
//! - `backtest` — simulate a composition over historical closes
//! - `list` — list stored compositions
//! - `show` — print a stored composition
//! - `init-config` — write a preset's TOML config to edit

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use indexforge_core::domain::{Composition, UniverseSnapshot};
use indexforge_core::synthetic::synthetic_universe;
use indexforge_core::{IndexConfig, RebalanceEngine, RebalanceError};
use indexforge_runner::backtest::{simulate, BacktestReport};
use indexforge_runner::batch::{run_batch, save_outcomes, BatchJob};
use indexforge_runner::diff::RebalanceDiff;
use indexforge_runner::export;
use indexforge_runner::loader::{load_prices_csv, load_universe};
use indexforge_runner::store::CompositionStore;

#[derive(Parser)]
#[command(
    name = "indexforge",
    about = "IndexForge CLI — thematic index construction"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one rebalance and print the composition.
    Calculate {
        /// Path to a TOML index config.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Built-in index definition: SPACEINFRA, AIINFRA.
        #[arg(long)]
        preset: Option<String>,

        /// Rebalance date (YYYY-MM-DD). Required with --preset; overrides the config's date.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Universe feed (.csv or .json).
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Generate a synthetic universe of this many companies instead.
        #[arg(long)]
        synthetic: Option<usize>,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Composition store directory. The composition is saved there and
        /// diffed against the previous stored rebalance.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Write the constituent table (and `_excluded` log) as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write a Markdown report.
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Write the full composition as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Run several index configs against one universe feed.
    Batch {
        /// TOML index configs (repeatable).
        #[arg(long = "config", required = true)]
        configs: Vec<PathBuf>,

        /// Universe feed (.csv or .json).
        #[arg(long)]
        universe: PathBuf,

        /// Composition store directory for successful runs.
        #[arg(long)]
        store: Option<PathBuf>,

        /// Run jobs one after another instead of in parallel.
        #[arg(long, default_value_t = false)]
        serial: bool,
    },
    /// Compare two compositions.
    Diff {
        /// Earlier composition JSON.
        #[arg(long, requires = "next")]
        previous: Option<PathBuf>,

        /// Later composition JSON.
        #[arg(long, requires = "previous")]
        next: Option<PathBuf>,

        /// Store directory: diff the latest composition of --index with the one before it.
        #[arg(long, conflicts_with_all = ["previous", "next"])]
        store: Option<PathBuf>,

        /// Index name (with --store).
        #[arg(long)]
        index: Option<String>,

        /// Only list held names whose weight moved more than this (fraction).
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,

        /// Write the diff as Markdown.
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
    /// Simulate a composition over historical closes.
    Backtest {
        /// Composition JSON.
        #[arg(long)]
        composition: PathBuf,

        /// Daily closes, long format: date,ticker,close.
        #[arg(long)]
        prices: PathBuf,

        /// Benchmark ticker to compare against (must be in the price file).
        #[arg(long)]
        benchmark: Option<String>,

        /// Index value on the first simulated day.
        #[arg(long, default_value_t = 1000.0)]
        base_value: f64,

        /// First date of the window (YYYY-MM-DD).
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last date of the window (YYYY-MM-DD).
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Write a Markdown report.
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
    /// List stored compositions.
    List {
        #[arg(long, default_value = "compositions")]
        store: PathBuf,
    },
    /// Print a stored composition.
    Show {
        #[arg(long, default_value = "compositions")]
        store: PathBuf,

        #[arg(long)]
        index: String,

        /// Rebalance date. Defaults to the latest stored.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print (or write) the TOML config of a built-in index.
    InitConfig {
        #[arg(long)]
        preset: String,

        /// Rebalance date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Write to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Calculate {
            config,
            preset,
            date,
            universe,
            synthetic,
            seed,
            store,
            csv,
            markdown,
            json,
        } => {
            let cfg = resolve_config(config.as_deref(), preset.as_deref(), date)?;
            let source = UniverseSource::from_args(universe, synthetic, seed)?;
            let outputs = Outputs {
                store,
                csv,
                markdown,
                json,
            };
            run_calculate(cfg, &source, &outputs)
        }
        Commands::Batch {
            configs,
            universe,
            store,
            serial,
        } => run_batch_cmd(&configs, &universe, store.as_deref(), !serial),
        Commands::Diff {
            previous,
            next,
            store,
            index,
            threshold,
            markdown,
        } => run_diff(previous, next, store, index, threshold, markdown.as_deref()),
        Commands::Backtest {
            composition,
            prices,
            benchmark,
            base_value,
            start,
            end,
            markdown,
        } => run_backtest(
            &composition,
            &prices,
            benchmark.as_deref(),
            base_value,
            (start, end),
            markdown.as_deref(),
        ),
        Commands::List { store } => run_list(&store),
        Commands::Show { store, index, date } => run_show(&store, &index, date),
        Commands::InitConfig {
            preset,
            date,
            output,
        } => run_init_config(&preset, date, output.as_deref()),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ─── calculate ───────────────────────────────────────────────────────

enum UniverseSource {
    File(PathBuf),
    Synthetic { count: usize, seed: u64 },
}

impl UniverseSource {
    fn from_args(universe: Option<PathBuf>, synthetic: Option<usize>, seed: u64) -> Result<Self> {
        match (universe, synthetic) {
            (Some(_), Some(_)) => bail!("--universe and --synthetic are mutually exclusive"),
            (Some(path), None) => Ok(Self::File(path)),
            (None, Some(count)) => Ok(Self::Synthetic { count, seed }),
            (None, None) => bail!("one of --universe or --synthetic is required"),
        }
    }

    fn load(&self, as_of: NaiveDate) -> Result<UniverseSnapshot> {
        match self {
            Self::File(path) => load_universe(path, as_of)
                .with_context(|| format!("failed to load universe {}", path.display())),
            Self::Synthetic { count, seed } => Ok(synthetic_universe(*count, as_of, *seed)),
        }
    }
}

struct Outputs {
    store: Option<PathBuf>,
    csv: Option<PathBuf>,
    markdown: Option<PathBuf>,
    json: Option<PathBuf>,
}

fn resolve_config(
    path: Option<&Path>,
    preset: Option<&str>,
    date: Option<NaiveDate>,
) -> Result<IndexConfig> {
    let mut cfg = match (path, preset) {
        (Some(_), Some(_)) => bail!("--config and --preset are mutually exclusive"),
        (Some(path), None) => IndexConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(name)) => {
            let Some(date) = date else {
                bail!("--date is required with --preset");
            };
            IndexConfig::preset(name, date)?
        }
        (None, None) => bail!("one of --config or --preset is required"),
    };
    if let Some(date) = date {
        cfg.index.rebalance_date = date;
    }
    Ok(cfg)
}

fn run_calculate(cfg: IndexConfig, source: &UniverseSource, outputs: &Outputs) -> Result<()> {
    let snapshot = source.load(cfg.index.rebalance_date)?;
    let composition = match RebalanceEngine::new(cfg).and_then(|engine| engine.run(&snapshot)) {
        Ok(c) => c,
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    };

    print_composition(&composition);

    if let Some(dir) = &outputs.store {
        let store = CompositionStore::new(dir);
        let previous = store.latest_before(&composition.index_name, composition.rebalance_date)?;
        let path = store.save(&composition)?;
        println!("Stored: {}", path.display());
        if let Some(previous) = previous {
            println!();
            print_diff(&RebalanceDiff::between(&previous, &composition), 0.0);
        }
    }
    if let Some(path) = &outputs.csv {
        export::save_csv(&composition, path)?;
        println!("CSV written: {}", path.display());
    }
    if let Some(path) = &outputs.markdown {
        write_file(path, &export::generate_report(&composition))?;
        println!("Report written: {}", path.display());
    }
    if let Some(path) = &outputs.json {
        write_file(path, &export::export_json(&composition)?)?;
        println!("JSON written: {}", path.display());
    }
    Ok(())
}

fn report_failure(err: &RebalanceError) {
    eprintln!("Rebalance failed");
    eprintln!("  Status: {}", err.status());
    eprintln!("  Stage:  {}", err.stage());
    eprintln!("  Error:  {err}");
    if let RebalanceError::NonConvergence { weights, .. } = err {
        eprintln!("  Final weights:");
        for (ticker, w) in weights {
            eprintln!("    {ticker:<8} {:>8.4}%", w * 100.0);
        }
    }
    let excluded = err.excluded();
    if !excluded.is_empty() {
        eprintln!("  Excluded ({}):", excluded.len());
        for e in excluded {
            eprintln!("    {:<8} {}", e.ticker, e.reason);
        }
    }
}

// ─── batch ───────────────────────────────────────────────────────────

fn run_batch_cmd(configs: &[PathBuf], universe: &Path, store: Option<&Path>, parallel: bool) -> Result<()> {
    let configs: Vec<IndexConfig> = configs
        .iter()
        .map(|p| {
            IndexConfig::from_file(p).with_context(|| format!("failed to load config {}", p.display()))
        })
        .collect::<Result<_>>()?;

    // One snapshot per distinct rebalance date, shared by every job on that date.
    let mut snapshots: BTreeMap<NaiveDate, Arc<UniverseSnapshot>> = BTreeMap::new();
    for cfg in &configs {
        let date = cfg.index.rebalance_date;
        if !snapshots.contains_key(&date) {
            let snapshot = load_universe(universe, date)
                .with_context(|| format!("failed to load universe {}", universe.display()))?;
            snapshots.insert(date, Arc::new(snapshot));
        }
    }
    let jobs: Vec<BatchJob> = configs
        .into_iter()
        .filter_map(|cfg| {
            let snapshot = snapshots.get(&cfg.index.rebalance_date)?;
            Some(BatchJob::new(cfg, Arc::clone(snapshot)))
        })
        .collect();

    let outcomes = run_batch(&jobs, parallel);
    let saved: Vec<_> = match store.map(CompositionStore::new) {
        Some(store) => save_outcomes(&outcomes, &store),
        None => outcomes.iter().map(|_| None).collect(),
    };

    println!("{:<14} {:<12} {:<20} {:>6} {:>9}", "Index", "Date", "Status", "Held", "Excluded");
    println!("{}", "-".repeat(65));
    let mut failures = 0;
    for (outcome, saved) in outcomes.iter().zip(&saved) {
        let (held, excluded) = match &outcome.result {
            Ok(c) => (c.len().to_string(), c.excluded.len().to_string()),
            Err(e) => ("-".to_string(), e.excluded().len().to_string()),
        };
        let status = match saved {
            Some(Err(_)) => "StoreError".to_string(),
            _ => outcome.status().to_string(),
        };
        println!(
            "{:<14} {:<12} {:<20} {:>6} {:>9}",
            outcome.index_name,
            outcome.rebalance_date.to_string(),
            status,
            held,
            excluded
        );
        if let Err(e) = &outcome.result {
            failures += 1;
            eprintln!("  {}: {} during {}: {e}", outcome.index_name, e.status(), e.stage());
        } else if let Some(Err(e)) = saved {
            failures += 1;
            eprintln!("  {}: not stored: {e}", outcome.index_name);
        }
    }

    if failures > 0 {
        eprintln!("{failures} of {} runs failed", outcomes.len());
        std::process::exit(1);
    }
    Ok(())
}

// ─── diff ────────────────────────────────────────────────────────────

fn run_diff(
    previous: Option<PathBuf>,
    next: Option<PathBuf>,
    store: Option<PathBuf>,
    index: Option<String>,
    threshold: f64,
    markdown: Option<&Path>,
) -> Result<()> {
    let (prev, next) = match (previous, next, store) {
        (Some(p), Some(n), _) => (export::load_json(&p)?, export::load_json(&n)?),
        (_, _, Some(dir)) => {
            let Some(index) = index else {
                bail!("--index is required with --store");
            };
            let store = CompositionStore::new(dir);
            let Some(next) = store.latest(&index)? else {
                bail!("no stored compositions for {index}");
            };
            let Some(prev) = store.latest_before(&index, next.rebalance_date)? else {
                bail!("only one stored composition for {index}; nothing to compare");
            };
            (prev, next)
        }
        _ => bail!("give --previous and --next, or --store and --index"),
    };
    if prev.index_name != next.index_name {
        tracing::warn!(previous = %prev.index_name, next = %next.index_name, "diffing different indices");
    }

    let diff = RebalanceDiff::between(&prev, &next);
    print_diff(&diff, threshold);
    if let Some(path) = markdown {
        write_file(path, &export::generate_diff_report(&diff))?;
        println!("Report written: {}", path.display());
    }
    Ok(())
}

fn print_diff(diff: &RebalanceDiff, threshold: f64) {
    println!(
        "{} rebalance {} -> {}",
        diff.index_name, diff.previous_date, diff.next_date
    );
    println!("  Turnover:  {:.2}%", diff.turnover * 100.0);
    for a in &diff.additions {
        println!("  + {:<8} {:>8.2}%", a.ticker, a.next * 100.0);
    }
    for r in &diff.removals {
        println!("  - {:<8} {:>8.2}%", r.ticker, r.previous * 100.0);
    }
    for c in diff.significant_changes(threshold) {
        println!(
            "  ~ {:<8} {:>8.2}% -> {:>6.2}% ({:+.2}pp)",
            c.ticker,
            c.previous * 100.0,
            c.next * 100.0,
            c.delta() * 100.0
        );
    }
}

// ─── backtest ────────────────────────────────────────────────────────

fn run_backtest(
    composition: &Path,
    prices: &Path,
    benchmark: Option<&str>,
    base_value: f64,
    (start, end): (Option<NaiveDate>, Option<NaiveDate>),
    markdown: Option<&Path>,
) -> Result<()> {
    let composition = export::load_json(composition)?;
    let prices = load_prices_csv(prices)
        .with_context(|| format!("failed to load prices {}", prices.display()))?
        .window(start, end);

    let mut report = simulate(&composition, &prices, base_value)?;
    if let Some(ticker) = benchmark {
        report = report.with_benchmark(&prices, &ticker.to_ascii_uppercase())?;
    }

    print_backtest(&report);
    if let Some(path) = markdown {
        write_file(path, &export::generate_backtest_report(&report))?;
        println!("Report written: {}", path.display());
    }
    Ok(())
}

fn print_backtest(report: &BacktestReport) {
    let m = &report.metrics;
    println!("=== Backtest: {} ({}) ===", report.index_name, report.rebalance_date);
    if let (Some(start), Some(end)) = (report.start_date(), report.end_date()) {
        println!("Window:            {start} to {end} ({} days)", m.trading_days);
    }
    if let Some(last) = report.points.last() {
        println!("Final Value:       {:.2} (base {:.2})", last.value, report.base_value);
    }
    println!("Total Return:      {:.2}%", m.total_return * 100.0);
    println!("Annualized Return: {:.2}%", m.annualized_return * 100.0);
    println!("Volatility:        {:.2}%", m.volatility * 100.0);
    println!("Sharpe:            {:.3}", m.sharpe);
    println!("Max Drawdown:      {:.2}%", m.max_drawdown * 100.0);
    if let Some(b) = &report.benchmark {
        println!();
        println!("Benchmark {}:", b.ticker);
        println!("  Total Return:    {:.2}%", b.metrics.total_return * 100.0);
        println!("  Sharpe:          {:.3}", b.metrics.sharpe);
        println!("  Alpha:           {:+.2}%", b.alpha * 100.0);
        println!("  Sharpe Diff:     {:+.3}", b.sharpe_difference);
    }
}

// ─── store inspection ────────────────────────────────────────────────

fn run_list(store: &Path) -> Result<()> {
    let entries = CompositionStore::new(store).list()?;
    if entries.is_empty() {
        println!("No stored compositions in {}", store.display());
        return Ok(());
    }
    println!("{:<14} {:<12} Path", "Index", "Date");
    println!("{}", "-".repeat(60));
    for e in &entries {
        println!(
            "{:<14} {:<12} {}",
            e.index_name,
            e.rebalance_date.to_string(),
            e.path.display()
        );
    }
    Ok(())
}

fn run_show(store: &Path, index: &str, date: Option<NaiveDate>) -> Result<()> {
    let store = CompositionStore::new(store);
    let composition = match date {
        Some(date) => store.load(index, date)?,
        None => match store.latest(index)? {
            Some(c) => c,
            None => bail!("no stored compositions for {index}"),
        },
    };
    print_composition(&composition);
    Ok(())
}

fn run_init_config(preset: &str, date: Option<NaiveDate>, output: Option<&Path>) -> Result<()> {
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let toml = IndexConfig::preset(preset, date)?.to_toml()?;
    match output {
        Some(path) => {
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            write_file(path, &toml)?;
            println!("Config written: {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}

// ─── output helpers ──────────────────────────────────────────────────

fn print_composition(c: &Composition) {
    let s = &c.stats;
    println!("=== {} — {} ===", c.index_name, c.rebalance_date);
    println!(
        "Constituents: {}  Excluded: {}  Effective holdings: {:.1}  Run: {}",
        s.num_constituents,
        c.excluded.len(),
        s.effective_holdings,
        c.run_id.short()
    );
    println!();
    println!(
        "{:>4} {:<8} {:<28} {:>8} {:>7} {:>6}",
        "Rank", "Ticker", "Name", "Weight", "Score", "Flag"
    );
    println!("{}", "-".repeat(66));
    for row in &c.constituents {
        let flag = if row.capped {
            "cap"
        } else if row.floored {
            "floor"
        } else {
            ""
        };
        println!(
            "{:>4} {:<8} {:<28} {:>7.2}% {:>7.2} {:>6}",
            row.rank,
            row.ticker,
            truncate(&row.name, 28),
            row.weight * 100.0,
            row.raw_score,
            flag
        );
    }
    if !c.excluded.is_empty() {
        println!();
        println!("Excluded:");
        for e in &c.excluded {
            println!("  {:<8} {}", e.ticker, e.reason);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}…")
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
