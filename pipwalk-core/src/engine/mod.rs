//! Walk-forward signal simulation engine.
//!
//! For each evaluation timestamp the engine:
//!
//! 1. Builds a strictly causal training window and scrubs labels that had not
//!    resolved by the decision time
//! 2. Estimates BUY/SELL viability with a distance-weighted neighbor vote,
//!    gated by distance thresholds and a one-sided binomial test
//! 3. Opens at most one position at a time and records exactly one decision

pub mod config;
pub mod estimator;
pub mod lifecycle;
pub mod progress;
pub mod stats;
pub mod window;

pub use config::{EngineConfig, EngineConfigError, LeakScrub};
pub use estimator::{
    choose_k, estimate, Estimation, Scaler, SideEstimate, SignalEstimate, VetoReason,
};
pub use lifecycle::{simulate, PositionState, SimulationOutput};
pub use progress::{LogProgress, NoProgress, SimulationProgress};
pub use stats::binomial_p_greater;
pub use window::{build_window, TrainingWindow};
