//! `twinsync-runtime` – the check pipeline and its outside collaborators.
//!
//! # Modules
//!
//! - [`camera`] – [`HaCamera`][camera::HaCamera]: lists Home Assistant
//!   cameras and fetches JPEG snapshots through the Supervisor API.
//! - [`vision`] – [`VisionAnalyzer`][vision::VisionAnalyzer]: asks Gemini
//!   whether a snapshot matches a spot's target description.
//! - [`voices`] – the feedback personalities and their system prompts.
//! - [`checker`] – [`SpotChecker`][checker::SpotChecker]: snapshot → memory
//!   context → analysis → stored check, for one spot or all of them.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod camera;
pub mod checker;
pub mod telemetry;
pub mod vision;
pub mod voices;

#[cfg(test)]
mod test_support;

pub use camera::{CameraEntity, HaCamera, SnapshotSource};
pub use checker::{CheckError, CheckOutcome, Outcome, SpotChecker};
pub use vision::{SpotAnalyzer, VisionAnalyzer};
