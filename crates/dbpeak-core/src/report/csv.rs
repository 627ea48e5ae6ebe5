//! CSV export of the peak table.

use crate::collector::DatabaseTarget;
use crate::error::{Error, Result};
use crate::store::PeakStore;

/// Fixed column set of the attachment.
const HEADER: [&str; 5] = [
    "DB_NAME",
    "PEAK_TIME",
    "MAX_DURATION_MS",
    "EXECUTION_COUNT",
    "SQL_TEXT",
];

/// One row per `(database, peak entry)`. Databases appear in configured
/// order; rows within a database are sorted worst peak first.
pub fn render_csv(store: &PeakStore, targets: &[DatabaseTarget]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(HEADER)
        .map_err(|e| Error::Report(format!("csv write: {}", e)))?;

    for target in targets {
        for entry in store.sorted_entries(&target.name) {
            let latency = entry.max_avg_latency_ms.to_string();
            let count = entry.last_execution_count.to_string();
            writer
                .write_record([
                    target.name.as_str(),
                    entry.peak_observed_at.as_str(),
                    latency.as_str(),
                    count.as_str(),
                    entry.statement_text.as_str(),
                ])
                .map_err(|e| Error::Report(format!("csv write: {}", e)))?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| Error::Report(format!("csv flush: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use serde_json::json;

    fn targets() -> Vec<DatabaseTarget> {
        vec![
            DatabaseTarget {
                name: "beta".to_string(),
                server_id: 2,
            },
            DatabaseTarget {
                name: "alpha".to_string(),
                server_id: 1,
            },
        ]
    }

    fn rendered_lines(store: &PeakStore, targets: &[DatabaseTarget]) -> Vec<String> {
        let bytes = render_csv(store, targets).unwrap();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn row_count_matches_store_and_order_follows_target_list() {
        let targets = targets();
        let mut store = PeakStore::new(&targets, 50);
        let now = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        store.update(
            "alpha",
            &[
                json!({"executionCount": 1, "timeSpent": 100, "queryText": "A1"}),
                json!({"executionCount": 1, "timeSpent": 300, "queryText": "A2"}),
            ],
            now,
        );
        store.update(
            "beta",
            &[json!({"executionCount": 1, "timeSpent": 200, "queryText": "B1"})],
            now,
        );

        let lines = rendered_lines(&store, &targets);
        assert_eq!(lines.len(), 1 + 3);
        // "beta" is configured first, so it renders first despite name order
        assert!(lines[1].starts_with("beta,"));
        assert!(lines[2].starts_with("alpha,"));
        assert!(lines[3].starts_with("alpha,"));
    }

    #[test]
    fn rows_within_database_are_non_increasing_by_latency() {
        let targets = targets();
        let mut store = PeakStore::new(&targets, 50);
        let now = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        store.update(
            "alpha",
            &[
                json!({"executionCount": 1, "timeSpent": 120, "queryText": "Q1"}),
                json!({"executionCount": 1, "timeSpent": 900, "queryText": "Q2"}),
                json!({"executionCount": 1, "timeSpent": 400, "queryText": "Q3"}),
            ],
            now,
        );

        let lines = rendered_lines(&store, &targets);
        let latencies: Vec<u64> = lines[1..]
            .iter()
            .map(|l| l.split(',').nth(2).unwrap().parse().unwrap())
            .collect();
        assert_eq!(latencies, vec![900, 400, 120]);
    }

    #[test]
    fn statement_text_with_commas_and_quotes_is_quoted() {
        let targets = targets();
        let mut store = PeakStore::new(&targets, 50);
        let now = NaiveTime::from_hms_opt(10, 0, 0).unwrap();
        store.update(
            "alpha",
            &[json!({
                "executionCount": 1,
                "timeSpent": 100,
                "queryText": "SELECT a, b FROM \"t\""
            })],
            now,
        );

        let bytes = render_csv(&store, &targets).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"SELECT a, b FROM \"\"t\"\"\""));
    }
}
