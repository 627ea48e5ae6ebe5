//! Report rendering: CSV, charts, HTML, and the shared finalize step.
//!
//! Everything here is pure given the store contents, the configured target
//! list, and the elapsed observation time — the timer-expiry path and the
//! interrupt path call the same [`finalize`] and get identical bytes for
//! identical store state.

mod chart;
mod csv;
mod html;

use std::time::Duration;

use crate::collector::DatabaseTarget;
use crate::error::Result;
use crate::store::PeakStore;

pub use chart::{render_database_chart, render_overall_chart};
pub use csv::render_csv;
pub use html::render_html;

/// Filename of the CSV attachment.
pub const CSV_ATTACHMENT_NAME: &str = "db_peak_report.csv";

/// The fully rendered report, ready for delivery.
pub struct Report {
    pub html: String,
    pub csv: Vec<u8>,
}

/// Renders the complete report from a finished store.
///
/// The single rendering entry point for both stop causes.
pub fn finalize(store: &PeakStore, targets: &[DatabaseTarget], elapsed: Duration) -> Result<Report> {
    let csv = render_csv(store, targets)?;
    let html = render_html(store, targets, elapsed)?;
    Ok(Report { html, csv })
}

/// Char-boundary-safe prefix truncation with an ellipsis marker.
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
