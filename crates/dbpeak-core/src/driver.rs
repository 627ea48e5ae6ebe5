//! The polling loop.
//!
//! POLLING -> POLLING until the configured duration elapses or the interrupt
//! flag drops, then the caller finalizes. The elapsed check runs before each
//! polling round, so a zero duration finalizes with an empty store before any
//! fetch. The interrupt flag is honored at loop boundaries and inside the
//! sliced inter-tick sleep, never mid-fetch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{debug, info};

use crate::collector::{DatabaseTarget, QuerySource};
use crate::error::Result;
use crate::store::PeakStore;

/// Loop timing, fixed at process start.
pub struct DriverOptions {
    /// Total observation duration.
    pub duration: Duration,
    /// Sleep between polling ticks.
    pub poll_interval: Duration,
}

/// Why the loop stopped. Informational only: both causes feed the same
/// finalize path and must produce identical output for identical store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    TimerExpired,
    Interrupted,
}

/// Runs the polling loop until timeout or interrupt.
///
/// Each tick fetches every target sequentially (one request completes before
/// the next starts) and folds the rows into the store. The only error that
/// escapes is [`crate::Error::AuthRejected`]; transient fetch failures arrive
/// here as empty batches.
pub fn run_poll_loop<S: QuerySource>(
    source: &S,
    targets: &[DatabaseTarget],
    store: &mut PeakStore,
    options: &DriverOptions,
    running: &AtomicBool,
) -> Result<StopCause> {
    let started = Instant::now();

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(StopCause::Interrupted);
        }
        if started.elapsed() >= options.duration {
            return Ok(StopCause::TimerExpired);
        }

        for target in targets {
            let rows = source.fetch(target)?;
            let changed = store.update(&target.name, &rows, Local::now().time());
            debug!(
                "{}: {} row(s), {} peak update(s)",
                target.name,
                rows.len(),
                changed
            );
        }

        let tracked: Vec<String> = targets
            .iter()
            .map(|t| format!("{}={}", t.name, store.entry_count(&t.name)))
            .collect();
        info!("tick complete, tracked peaks: {}", tracked.join(" "));

        // Sleep in short slices so an interrupt is picked up promptly
        let slice = Duration::from_millis(100);
        let mut remaining = options.poll_interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let nap = remaining.min(slice);
            std::thread::sleep(nap);
            remaining = remaining.saturating_sub(nap);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    use serde_json::{Value, json};

    struct ScriptedSource {
        rows: Vec<Value>,
        calls: RefCell<usize>,
        /// Cleared after the first fetch, simulating an interrupt mid-tick.
        clear_on_fetch: Option<Arc<AtomicBool>>,
    }

    impl QuerySource for ScriptedSource {
        fn fetch(&self, _target: &DatabaseTarget) -> Result<Vec<Value>> {
            *self.calls.borrow_mut() += 1;
            if let Some(flag) = &self.clear_on_fetch {
                flag.store(false, Ordering::SeqCst);
            }
            Ok(self.rows.clone())
        }
    }

    struct RejectingSource;

    impl QuerySource for RejectingSource {
        fn fetch(&self, _target: &DatabaseTarget) -> Result<Vec<Value>> {
            Err(Error::AuthRejected(401))
        }
    }

    fn targets() -> Vec<DatabaseTarget> {
        vec![
            DatabaseTarget {
                name: "db1".to_string(),
                server_id: 1,
            },
            DatabaseTarget {
                name: "db2".to_string(),
                server_id: 2,
            },
        ]
    }

    #[test]
    fn zero_duration_expires_before_any_fetch() {
        let targets = targets();
        let source = ScriptedSource {
            rows: vec![json!({"executionCount": 1, "timeSpent": 100, "queryText": "Q"})],
            calls: RefCell::new(0),
            clear_on_fetch: None,
        };
        let mut store = PeakStore::new(&targets, 50);
        let options = DriverOptions {
            duration: Duration::ZERO,
            poll_interval: Duration::from_secs(60),
        };
        let running = AtomicBool::new(true);

        let cause = run_poll_loop(&source, &targets, &mut store, &options, &running).unwrap();

        assert_eq!(cause, StopCause::TimerExpired);
        assert_eq!(*source.calls.borrow(), 0);
        assert_eq!(store.entry_count("db1"), 0);
        assert_eq!(store.entry_count("db2"), 0);
    }

    #[test]
    fn cleared_flag_interrupts_before_polling() {
        let targets = targets();
        let source = ScriptedSource {
            rows: Vec::new(),
            calls: RefCell::new(0),
            clear_on_fetch: None,
        };
        let mut store = PeakStore::new(&targets, 50);
        let options = DriverOptions {
            duration: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(60),
        };
        let running = AtomicBool::new(false);

        let cause = run_poll_loop(&source, &targets, &mut store, &options, &running).unwrap();

        assert_eq!(cause, StopCause::Interrupted);
        assert_eq!(*source.calls.borrow(), 0);
    }

    #[test]
    fn interrupt_during_tick_takes_effect_at_next_boundary() {
        let targets = targets();
        let running = Arc::new(AtomicBool::new(true));
        let source = ScriptedSource {
            rows: vec![json!({"executionCount": 2, "timeSpent": 400, "queryText": "Q"})],
            calls: RefCell::new(0),
            clear_on_fetch: Some(running.clone()),
        };
        let mut store = PeakStore::new(&targets, 50);
        let options = DriverOptions {
            duration: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(60),
        };

        let cause = run_poll_loop(&source, &targets, &mut store, &options, &running).unwrap();

        assert_eq!(cause, StopCause::Interrupted);
        // the in-flight tick still finished both targets
        assert_eq!(*source.calls.borrow(), 2);
        assert_eq!(store.entry_count("db1"), 1);
        assert_eq!(store.entry_count("db2"), 1);
    }

    #[test]
    fn auth_rejection_propagates_immediately() {
        let targets = targets();
        let mut store = PeakStore::new(&targets, 50);
        let options = DriverOptions {
            duration: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(60),
        };
        let running = AtomicBool::new(true);

        let err =
            run_poll_loop(&RejectingSource, &targets, &mut store, &options, &running).unwrap_err();
        assert!(matches!(err, Error::AuthRejected(401)));
    }
}
