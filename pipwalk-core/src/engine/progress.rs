//! Progress reporting for the walk-forward simulation.

use std::time::Duration;

/// Receives simulation progress. Advisory only: implementations must not
/// influence the simulation.
pub trait SimulationProgress: Send + Sync {
    fn on_start(&self, total: usize);

    /// Called after every evaluated timestamp; `done` counts from 1.
    fn on_step(&self, done: usize, total: usize, elapsed: Duration);

    fn on_finish(&self, trades: usize, total: usize, elapsed: Duration);
}

/// Logs progress and an ETA through `tracing` every `every` steps.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    pub every: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { every: 500 }
    }
}

impl SimulationProgress for LogProgress {
    fn on_start(&self, total: usize) {
        tracing::info!(total, "simulation started");
    }

    fn on_step(&self, done: usize, total: usize, elapsed: Duration) {
        if self.every == 0 || done % self.every != 0 {
            return;
        }
        let eta = eta(done, total, elapsed);
        tracing::info!(
            "[{done}/{total}] {:.1}% elapsed {:.0}s eta {:.0}s",
            100.0 * done as f64 / total.max(1) as f64,
            elapsed.as_secs_f64(),
            eta.as_secs_f64()
        );
    }

    fn on_finish(&self, trades: usize, total: usize, elapsed: Duration) {
        tracing::info!(trades, total, elapsed_s = elapsed.as_secs_f64(), "simulation finished");
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl SimulationProgress for NoProgress {
    fn on_start(&self, _total: usize) {}
    fn on_step(&self, _done: usize, _total: usize, _elapsed: Duration) {}
    fn on_finish(&self, _trades: usize, _total: usize, _elapsed: Duration) {}
}

/// Linear extrapolation of the remaining time.
pub fn eta(done: usize, total: usize, elapsed: Duration) -> Duration {
    if done == 0 || done >= total {
        return Duration::ZERO;
    }
    elapsed.mul_f64((total - done) as f64 / done as f64)
}
