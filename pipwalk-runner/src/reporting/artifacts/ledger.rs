//! Trade ledger and decision record export (CSV).

use anyhow::{Context, Result};
use std::path::Path;

use pipwalk_core::domain::{DecisionRecord, Trade};

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create trades CSV {}", path.display()))?;
    for trade in trades {
        w.serialize(trade)?;
    }
    if trades.is_empty() {
        w.write_record(["entry_time", "side", "profit_pips", "holding_minutes"])?;
    }
    w.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}

/// One row per evaluated minute; `profit` is empty on NONE rows.
pub fn write_decisions_csv(path: &Path, decisions: &[DecisionRecord]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create decisions CSV {}", path.display()))?;
    for record in decisions {
        w.serialize(record)?;
    }
    if decisions.is_empty() {
        w.write_record(["time", "signal", "profit"])?;
    }
    w.flush().with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(())
}
