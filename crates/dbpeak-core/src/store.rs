//! Per-database high-water-mark table keyed by statement identity.
//!
//! This is the whole in-memory state of a run: for every `(database,
//! statement)` pair, the highest average latency seen so far plus the sample
//! context at the moment that peak was recorded. Created empty at start,
//! mutated once per tick, read once at finalize, then dropped.

use std::collections::HashMap;

use chrono::NaiveTime;
use serde_json::Value;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::collector::DatabaseTarget;

/// Field-name fallback for the execution count, evaluated left to right.
/// First present non-zero number wins.
const EXECUTION_COUNT_FIELDS: &[&str] = &["executionCount", "hits"];

/// Field-name fallback for cumulative time spent, in milliseconds.
const TIME_SPENT_FIELDS: &[&str] = &["timeSpent", "duration"];

/// Field-name fallback for the statement text. First present non-empty
/// string wins; whitespace-only strings win the fallback and trim to "".
const QUERY_TEXT_FIELDS: &[&str] = &["queryText", "name"];

/// Sentinel text for rows carrying no statement text at all.
const UNKNOWN_STATEMENT: &str = "Unknown";

/// Peak record for one distinct statement in one database.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakEntry {
    /// Normalized statement text (truncation happens at render time only).
    pub statement_text: String,
    /// Highest observed average latency, monotonically non-decreasing.
    pub max_avg_latency_ms: u64,
    /// Execution count of the sample that set the current peak.
    pub last_execution_count: u64,
    /// Wall-clock "HH:MM" of the last peak update.
    pub peak_observed_at: String,
}

/// The aggregation store for one run.
pub struct PeakStore {
    min_duration_ms: u64,
    /// database name -> statement identity -> peak entry
    peaks: HashMap<String, HashMap<u64, PeakEntry>>,
}

/// Stable identity of a statement: xxh3 of its trimmed text. Identical text
/// always maps to the same identity across runs; distinct texts colliding is
/// an accepted limitation.
pub fn statement_identity(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

impl PeakStore {
    /// Creates an empty store with one slot per configured target, so that
    /// databases with no qualifying samples still appear in the report.
    pub fn new(targets: &[DatabaseTarget], min_duration_ms: u64) -> Self {
        let peaks = targets
            .iter()
            .map(|t| (t.name.clone(), HashMap::new()))
            .collect();
        Self {
            min_duration_ms,
            peaks,
        }
    }

    /// Folds one batch of raw rows into the store.
    ///
    /// Returns the number of entries created or overwritten. Rows with a zero
    /// execution count or an average below the noise floor are skipped; a
    /// sample merely equal to the stored peak leaves the entry (and its
    /// `peak_observed_at`) untouched. Batches for database names that were
    /// not configured at construction are ignored.
    pub fn update(&mut self, db_name: &str, rows: &[Value], now: NaiveTime) -> usize {
        let Some(records) = self.peaks.get_mut(db_name) else {
            debug!("ignoring batch for unconfigured database '{}'", db_name);
            return 0;
        };

        let mut updates = 0;
        let stamp = now.format("%H:%M").to_string();

        for row in rows {
            let count = first_number(row, EXECUTION_COUNT_FIELDS);
            if count <= 0.0 {
                continue;
            }
            let spent = first_number(row, TIME_SPENT_FIELDS);

            let avg = (spent / count).floor() as u64;
            if avg < self.min_duration_ms {
                continue;
            }

            let text = first_text(row, QUERY_TEXT_FIELDS).trim().to_string();
            let identity = statement_identity(&text);

            match records.get_mut(&identity) {
                None => {
                    records.insert(
                        identity,
                        PeakEntry {
                            statement_text: text,
                            max_avg_latency_ms: avg,
                            last_execution_count: count as u64,
                            peak_observed_at: stamp.clone(),
                        },
                    );
                    updates += 1;
                }
                Some(entry) if avg > entry.max_avg_latency_ms => {
                    entry.max_avg_latency_ms = avg;
                    entry.last_execution_count = count as u64;
                    entry.peak_observed_at = stamp.clone();
                    updates += 1;
                }
                Some(_) => {}
            }
        }
        updates
    }

    /// Number of tracked statements for one database.
    pub fn entry_count(&self, db_name: &str) -> usize {
        self.peaks.get(db_name).map_or(0, |m| m.len())
    }

    /// Entries for one database, worst peak first. Equal peaks order by
    /// statement text so rendering is deterministic.
    pub fn sorted_entries(&self, db_name: &str) -> Vec<&PeakEntry> {
        let mut entries: Vec<&PeakEntry> = self
            .peaks
            .get(db_name)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| {
            b.max_avg_latency_ms
                .cmp(&a.max_avg_latency_ms)
                .then_with(|| a.statement_text.cmp(&b.statement_text))
        });
        entries
    }

    /// The configured noise floor in milliseconds.
    pub fn noise_floor_ms(&self) -> u64 {
        self.min_duration_ms
    }

    /// Worst peak latency for one database, 0 when nothing qualified.
    pub fn worst_latency(&self, db_name: &str) -> u64 {
        self.peaks
            .get(db_name)
            .and_then(|m| m.values().map(|e| e.max_avg_latency_ms).max())
            .unwrap_or(0)
    }
}

/// Ordered fallback over numeric fields: first present non-zero value wins,
/// default 0. Matches the documented `executionCount`/`hits` precedence.
fn first_number(row: &Value, fields: &[&str]) -> f64 {
    for field in fields {
        if let Some(v) = row.get(field).and_then(Value::as_f64)
            && v != 0.0
        {
            return v;
        }
    }
    0.0
}

/// Ordered fallback over text fields: first present non-empty string wins,
/// default "Unknown".
fn first_text<'a>(row: &'a Value, fields: &[&str]) -> &'a str {
    for field in fields {
        if let Some(s) = row.get(field).and_then(Value::as_str)
            && !s.is_empty()
        {
            return s;
        }
    }
    UNKNOWN_STATEMENT
}
