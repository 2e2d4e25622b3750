//! `twinsync-memory` – check history and what it says about a spot.
//!
//! Turns a spot's stored check history into behavioural statistics and a
//! short prose summary that is fed back into the next vision check.
//!
//! # Modules
//!
//! - [`patterns`] – [`PatternAnalyzer`][patterns::PatternAnalyzer]: recurring
//!   items, best/worst weekday and pass streaks over a window of records.
//! - [`memory`] – [`MemoryAggregator`][memory::MemoryAggregator]: wraps the
//!   patterns with total checks and pass rate into a
//!   [`SpotMemory`][memory::SpotMemory] snapshot.
//! - [`context`] – [`render_context`][context::render_context]: the
//!   natural-language memory context handed to the analyzer.
//! - [`store`] – [`SpotStore`][store::SpotStore]: SQLite persistence for
//!   spots and their checks, supplying the bounded memory window.

pub mod context;
pub mod memory;
pub mod patterns;
pub mod store;

pub use context::render_context;
pub use memory::{MemoryAggregator, SpotMemory};
pub use patterns::{PatternAnalyzer, SpotPatterns};
pub use store::{SpotStore, SpotSummary, StoreError, DEFAULT_HISTORY_LIMIT, MEMORY_WINDOW};
