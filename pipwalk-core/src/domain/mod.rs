//! Domain types for pipwalk

pub mod bar;
pub mod candle;
pub mod trade;

pub use bar::{Bar, BarrierLabels, Outcome};
pub use candle::Candle;
pub use trade::{DecisionRecord, Side, Signal, Trade};
