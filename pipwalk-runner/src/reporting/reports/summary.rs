//! Plain-text run summary printed by the CLI.

use std::fmt::Write;

use crate::metrics::StreakDistribution;
use crate::runner::BacktestResult;

/// `{1: 4, 2: 1}`; `{}` when empty.
pub fn format_distribution(dist: &StreakDistribution) -> String {
    let body: Vec<String> = dist.iter().map(|(len, count)| format!("{len}: {count}")).collect();
    format!("{{{}}}", body.join(", "))
}

pub fn render_summary(result: &BacktestResult) -> String {
    let m = &result.metrics;
    let pf = if m.profit_factor.is_finite() {
        format!("{:.2}", m.profit_factor)
    } else {
        "inf".to_string()
    };

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "=== Backtest: {} ===", result.instrument);
    if result.has_synthetic {
        let _ = writeln!(out, "WARNING: synthetic data, results are not meaningful");
    }
    let rows: Vec<(&str, String)> = vec![
        ("Period", format!("{} .. {}", result.start.format("%Y-%m-%d %H:%M"), result.end.format("%Y-%m-%d %H:%M"))),
        ("Days", m.days.to_string()),
        ("Trades", m.num_trades.to_string()),
        ("Win rate", format!("{:.2}% ({}/{})", m.win_rate, m.wins, m.num_trades)),
        ("Net profit (pips)", format!("{:.1}", m.net_profit)),
        ("Daily net (pips)", format!("{:.1}", m.daily_net_profit())),
        ("Profit factor", pf),
        ("Avg return (pips)", format!("{:.2}", m.avg_return)),
        ("Max drawdown", format!("{:.2}", m.max_drawdown)),
        ("Avg wait (min)", format!("{:.2}", m.avg_wait)),
        ("Median wait (min)", format!("{:.2}", m.median_wait)),
        ("Std wait (min)", format!("{:.2}", m.std_wait)),
        ("Mean hold (min)", format!("{:.2}", m.mean_hold)),
        ("Median hold (min)", format!("{:.2}", m.median_hold)),
        ("Std hold (min)", format!("{:.2}", m.std_hold)),
        ("Avg hold, winners", format!("{:.2}", m.avg_hold_win)),
        ("Avg hold, losers", format!("{:.2}", m.avg_hold_loss)),
        ("Win streaks", format_distribution(&m.win_streaks)),
        ("Loss streaks", format_distribution(&m.loss_streaks)),
        ("BUY signal runs", format_distribution(&m.buy_signal_streaks)),
        ("SELL signal runs", format_distribution(&m.sell_signal_streaks)),
        ("BUY loss streaks", format_distribution(&m.buy_loss_streaks)),
        ("SELL loss streaks", format_distribution(&m.sell_loss_streaks)),
        ("Unresolved entries", m.no_decision_count.to_string()),
        ("Unresolved rate", format!("{:.2}%", m.no_decision_rate)),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "{label:<20}: {value}");
    }
    out
}
