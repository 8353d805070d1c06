//! Growth curve export: cumulative pips after each trade.

use anyhow::{Context, Result};
use std::path::Path;

use crate::runner::BacktestResult;

pub fn write_equity_csv(path: &Path, result: &BacktestResult) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create equity CSV {}", path.display()))?;
    w.write_record(["trade_no", "entry_time", "cumulative_pips"])?;
    for (i, (trade, cum)) in result.trades.iter().zip(result.equity_curve()).enumerate() {
        w.write_record([
            (i + 1).to_string(),
            trade.entry_time.to_rfc3339(),
            format!("{cum:.4}"),
        ])?;
    }
    w.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
