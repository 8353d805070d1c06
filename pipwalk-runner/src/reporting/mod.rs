//! Reporting and artifact export pipeline.

pub mod artifacts;
pub mod reports;

pub use artifacts::{save_artifacts, ArtifactPaths, RunManifest};
pub use reports::{format_distribution, render_summary};
