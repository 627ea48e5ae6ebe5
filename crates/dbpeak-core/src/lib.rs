//! dbpeak-core — shared library for the dbpeak peak-latency reporter.
//!
//! Provides:
//! - `config` — TOML configuration surface (controller, targets, run, smtp, email)
//! - `collector` — controller API client and the `QuerySource` seam
//! - `store` — per-database high-water-mark table keyed by statement identity
//! - `report` — CSV / chart / HTML rendering and the shared finalize step
//! - `notify` — SMTP delivery of the rendered report
//! - `driver` — the polling loop state machine

pub mod collector;
pub mod config;
pub mod driver;
pub mod error;
pub mod notify;
pub mod report;
pub mod store;

pub use error::{Error, Result};
