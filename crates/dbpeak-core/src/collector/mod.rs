//! Query statistics collection from the monitoring controller.
//!
//! The driver talks to a [`QuerySource`] rather than to the HTTP client
//! directly, so the polling loop can be exercised in tests with canned rows.

mod controller;

use serde::Deserialize;

use crate::error::Result;

pub use controller::ControllerClient;

/// One monitored database: display name plus the controller-side server id.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseTarget {
    /// Display name, unique across the target list.
    pub name: String,
    /// `dbServerId` used in the fetch request body.
    pub server_id: i64,
}

/// Source of raw per-statement samples for one polling tick.
///
/// Contract: transient failures (transport error, non-200 status, malformed
/// payload) are swallowed by the implementation and reported as an empty
/// batch — the next tick is the implicit retry. The single fatal case is
/// [`crate::Error::AuthRejected`], which callers must propagate.
pub trait QuerySource {
    /// Fetches the trailing-window statement samples for one database.
    fn fetch(&self, target: &DatabaseTarget) -> Result<Vec<serde_json::Value>>;
}
