//! Human-readable run reports.

mod summary;

pub use summary::{format_distribution, render_summary};
