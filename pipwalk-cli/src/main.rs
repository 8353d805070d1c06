//! pipwalk CLI: download, run, feature evaluation, sweep and cache commands.
//!
//! Commands:
//! - `download`: fetch minute candles from OANDA and cache as Parquet
//! - `run`: execute a walk-forward backtest from a TOML config file
//! - `eval-features`: select features on a holdout span and save the list
//! - `sweep`: grid-search distance thresholds and save the best pair
//! - `cache status`: report cached instruments and their ranges

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pipwalk_core::data::{
    download_instruments, DataProvider, LogProgress, OandaProvider, ParquetCache, LIVE_BASE_URL, PRACTICE_BASE_URL,
};
use pipwalk_runner::feature_eval::EvalThresholds;
use pipwalk_runner::{
    evaluate_holdout, prepare, render_summary, run_single_backtest, run_sweep, save_artifacts, BacktestConfig,
    RunFlags, ThresholdGrid,
};

#[derive(Parser)]
#[command(name = "pipwalk", about = "pipwalk: walk-forward nearest-neighbour FX backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download minute candles from OANDA and cache as Parquet.
    Download {
        /// Instruments to download (e.g., USD_JPY EUR_JPY).
        #[arg(required = true)]
        instruments: Vec<String>,

        /// Start date (YYYY-MM-DD, UTC).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD, UTC), inclusive. Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Force re-download even if cached.
        #[arg(long, default_value_t = false)]
        force: bool,

        /// Config file supplying cache dir, token variable and endpoint.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Evaluate every candidate feature on a holdout span and save the selection.
    EvalFeatures {
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// Where to write the selected list. Defaults to the config's features file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory for the correlation and VIF tables.
        #[arg(long, default_value = "eval_features")]
        report_dir: PathBuf,
    },
    /// Grid-search distance thresholds; the best pair goes to the thresholds file.
    Sweep {
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// Mean-distance threshold range, `min:max`.
        #[arg(long, default_value = "0.5:2.0")]
        mean: String,

        /// Max-distance threshold range, `min:max`.
        #[arg(long, default_value = "1.0:3.0")]
        max: String,

        #[arg(long, default_value_t = 0.1)]
        step: f64,

        /// Grid points with fewer trades never win.
        #[arg(long, default_value_t = 1)]
        min_trades: usize,

        /// Override file to write. Defaults to the config's thresholds file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args, Clone, Copy)]
struct DataArgs {
    /// Offline mode: no network access.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Use synthetic data as the last fallback.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Re-download even if cached.
    #[arg(long, default_value_t = false)]
    force: bool,
}

impl From<DataArgs> for RunFlags {
    fn from(a: DataArgs) -> Self {
        RunFlags {
            offline: a.offline,
            synthetic: a.synthetic,
            force: a.force,
        }
    }
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached instruments, candle counts and date ranges.
    Status {
        /// Cache directory. Defaults to the config's cache dir.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            instruments,
            start,
            end,
            force,
            config,
        } => run_download(&load_config(config.as_deref())?, instruments, &start, end.as_deref(), force),
        Commands::Run {
            config,
            data,
            output_dir,
        } => run_backtest_cmd(&load_config(config.as_deref())?, data.into(), &output_dir),
        Commands::EvalFeatures {
            config,
            data,
            output,
            report_dir,
        } => run_eval_features(&load_config(config.as_deref())?, data.into(), output, &report_dir),
        Commands::Sweep {
            config,
            data,
            mean,
            max,
            step,
            min_trades,
            output,
        } => {
            let grid = ThresholdGrid::from_ranges(parse_range(&mean)?, parse_range(&max)?, step);
            run_sweep_cmd(&load_config(config.as_deref())?, data.into(), &grid, min_trades, output)
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { cache_dir, config } => {
                let config = load_config(config.as_deref())?;
                run_cache_status(&cache_dir.unwrap_or(config.data.cache_dir))
            }
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<BacktestConfig> {
    match path {
        Some(p) => BacktestConfig::from_file(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(BacktestConfig::default()),
    }
}

/// OANDA provider from the token in the configured environment variable.
/// `None` when offline or when the variable is unset.
fn build_provider(config: &BacktestConfig, offline: bool) -> Result<Option<OandaProvider>> {
    if offline {
        return Ok(None);
    }
    let Ok(token) = std::env::var(&config.data.token_env) else {
        tracing::info!(var = %config.data.token_env, "access token not set; provider disabled");
        return Ok(None);
    };
    let base_url = if config.data.practice {
        PRACTICE_BASE_URL
    } else {
        LIVE_BASE_URL
    };
    Ok(Some(OandaProvider::new(base_url, token)?))
}

fn run_download(
    config: &BacktestConfig,
    instruments: Vec<String>,
    start: &str,
    end: Option<&str>,
    force: bool,
) -> Result<()> {
    let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    let end_date = end
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()?
        .unwrap_or_else(|| Utc::now().date_naive());
    if end_date < start_date {
        bail!("end {end_date} is before start {start_date}");
    }
    let start = utc_midnight(start_date)?;
    let end = utc_midnight(end_date + chrono::Duration::days(1))?;

    let Some(provider) = build_provider(config, false)? else {
        bail!("set {} to download from OANDA", config.data.token_env);
    };
    let cache = ParquetCache::new(&config.data.cache_dir);
    let refs: Vec<&str> = instruments.iter().map(String::as_str).collect();

    let summary = download_instruments(&provider, &cache, &refs, start, end, force, &LogProgress);
    if !summary.all_succeeded() {
        for (instrument, err) in &summary.errors {
            eprintln!("Error for {instrument}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_backtest_cmd(config: &BacktestConfig, flags: RunFlags, output_dir: &Path) -> Result<()> {
    let provider = build_provider(config, flags.offline)?;
    let cache = ParquetCache::new(&config.data.cache_dir);

    let result = run_single_backtest(
        config,
        &cache,
        provider.as_ref().map(|p| p as &dyn DataProvider),
        flags,
    )?;

    println!();
    print!("{}", render_summary(&result));

    let paths = save_artifacts(&result, output_dir)?;
    println!();
    println!("Artifacts saved to: {}", paths.run_dir.display());
    Ok(())
}

fn run_eval_features(
    config: &BacktestConfig,
    flags: RunFlags,
    output: Option<PathBuf>,
    report_dir: &Path,
) -> Result<()> {
    let provider = build_provider(config, flags.offline)?;
    let cache = ParquetCache::new(&config.data.cache_dir);

    let eval = evaluate_holdout(
        config,
        &cache,
        provider.as_ref().map(|p| p as &dyn DataProvider),
        flags,
        Utc::now(),
        &EvalThresholds::default(),
    )?;

    eval.write_reports(report_dir)?;
    let output = output
        .or_else(|| config.features.file.clone())
        .unwrap_or_else(|| PathBuf::from("selected_features.json"));
    eval.save_selected(&output)?;

    println!("Rows evaluated:       {} ({} labeled)", eval.rows, eval.labeled_rows);
    println!("Dropped (collinear):  {:?}", eval.dropped_collinear);
    println!("Dropped (target):     {:?}", eval.dropped_target);
    println!("Selected:             {:?}", eval.selected);
    println!("Saved to: {}", output.display());
    Ok(())
}

fn run_sweep_cmd(
    config: &BacktestConfig,
    flags: RunFlags,
    grid: &ThresholdGrid,
    min_trades: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let provider = build_provider(config, flags.offline)?;
    let cache = ParquetCache::new(&config.data.cache_dir);
    let data = prepare(
        config,
        &cache,
        provider.as_ref().map(|p| p as &dyn DataProvider),
        flags,
    )?;

    let results = run_sweep(config, &data, grid, min_trades, |idx, total, p| {
        tracing::info!(
            "[{}/{}] mean={:.2} max={:.2} trades={} pf={:.2}",
            idx + 1,
            total,
            p.mean_thresh,
            p.max_thresh,
            p.num_trades,
            p.profit_factor
        );
    });

    println!();
    println!("{:>6} {:>6} {:>8} {:>8} {:>10}", "mean", "max", "trades", "pf", "net pips");
    println!("{}", "-".repeat(42));
    for p in results.ranked().into_iter().take(10) {
        println!(
            "{:>6.2} {:>6.2} {:>8} {:>8.2} {:>10.1}",
            p.mean_thresh, p.max_thresh, p.num_trades, p.profit_factor, p.net_profit
        );
    }

    let path = output
        .or_else(|| config.data.thresholds_file.clone())
        .unwrap_or_else(|| PathBuf::from("thresholds.json"));
    if let Some(best) = results.save_best(&path)? {
        println!();
        println!(
            "Best: mean={:.2} max={:.2} saved to {}",
            best.mean_thresh,
            best.max_thresh,
            path.display()
        );
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = ParquetCache::new(cache_dir);
    let instruments = cache.instruments();
    if instruments.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    let refs: Vec<&str> = instruments.iter().map(String::as_str).collect();
    println!("Cache: {}", cache_dir.display());
    println!("Instruments: {}", instruments.len());
    println!();
    println!("{:<10} {:<36} {:>10}", "Instrument", "Range (UTC)", "Candles");
    println!("{}", "-".repeat(58));
    for status in cache.status(&refs) {
        let range = match (status.start, status.end) {
            (Some(s), Some(e)) => format!("{} .. {}", s.format("%Y-%m-%d %H:%M"), e.format("%Y-%m-%d %H:%M")),
            _ => "-".to_string(),
        };
        let count = status.candle_count.map_or("-".to_string(), |c| c.to_string());
        println!("{:<10} {:<36} {:>10}", status.instrument, range, count);
    }
    Ok(())
}

fn utc_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("invalid date {date}"))
}

fn parse_range(s: &str) -> Result<(f64, f64)> {
    let Some((lo, hi)) = s.split_once(':') else {
        bail!("expected min:max, got '{s}'");
    };
    let (lo, hi): (f64, f64) = (lo.trim().parse()?, hi.trim().parse()?);
    if lo <= 0.0 || hi < lo {
        bail!("invalid range '{s}'");
    }
    Ok((lo, hi))
}
