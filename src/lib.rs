//! # delayq
//!
//! A single-queue sequential scheduler for tokio. Callers enqueue slots,
//! each with an optional delay, and await a completion. Slots are released
//! in strict FIFO order, one at a time, each only after its own delay has
//! run and the previous slot has been released.
//!
//! Provides the queue itself, typed configuration (TOML and environment),
//! a structured event stream, and tracing/OpenTelemetry wiring.

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod queue;
pub mod telemetry;

pub use config::QueueConfig;
pub use error::{Error, Result};
pub use queue::{Completion, DelayedQueue};
