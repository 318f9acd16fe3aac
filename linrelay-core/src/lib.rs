//! # linrelay-core
//!
//! Core library for linrelay - a bridge from a Claude Code session journal
//! to a Linear-style tracker.
//!
//! This library provides:
//! - A multi-file append-only journal tailer with crash-safe resumption
//! - A projector pairing tool invocations with their results and mapping
//!   records to tracker activities
//! - A plan reducer mirroring the agent's task list onto the tracker
//! - A token-bucket rate limiter governing all tracker writes
//! - Successor-file discovery for continued sessions
//!
//! ## Architecture
//!
//! Data flows one way:
//!
//! ```text
//! locator → tailer(s) → emitter → rate limiter → tracker API
//! ```
//!
//! The cursor store is written periodically from the tailers; the plan
//! reducer is a sideband off the emitter. Everything runs on one logical
//! task; tracker writes may suspend but nothing else touches the state.

// Re-export commonly used items at the crate root
pub use activity::{Activity, ActivityContent, PlanItem, PlanItemStatus};
pub use config::Config;
pub use emitter::Emitter;
pub use error::{Error, Result};
pub use tracker::{HttpTrackerClient, TrackerClient};
pub use watcher::{WatchSummary, Watcher};

// Public modules
pub mod activity;
pub mod config;
pub mod cursor;
pub mod emitter;
pub mod error;
pub mod journal;
pub mod lock;
pub mod locator;
pub mod logging;
pub mod plan;
pub mod rate_limit;
pub mod tailer;
pub mod toolmap;
pub mod tracker;
pub mod watcher;
