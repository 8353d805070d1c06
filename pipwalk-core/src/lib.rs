//! pipwalk core: walk-forward neighbor-vote backtesting of minute FX data.
//!
//! This crate contains:
//! - Domain types (candles, labeled bars, trades, decision records)
//! - Market data acquisition, cleaning and the Parquet cache
//! - Indicators and the declarative feature registry
//! - Triple-barrier labeling and the feature/label store
//! - The causal window builder, neighborhood estimator and trade lifecycle

pub mod calendar;
pub mod data;
pub mod domain;
pub mod engine;
pub mod features;
pub mod indicators;
pub mod labeling;
pub mod store;
