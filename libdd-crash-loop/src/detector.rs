// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::key_value::KeyValueStore;
use crate::startup_events::{StartupEvent, StartupEventStore};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Consecutive failed launches before the application is considered looping.
pub const DEFAULT_CRASH_LOOP_THRESHOLD: usize = 5;

/// Decides, once per launch, whether the application is stuck crashing on
/// startup.
///
/// The presence of `crash_report_path` (the artifact the native crash-capture
/// library leaves behind) marks the previous launch as failed. The detector
/// keeps the last `threshold` outcomes in the injected key-value store and
/// reports a loop only when every retained outcome is a failure: a single
/// success anywhere in the window resets loop status.
///
/// Fails open: any persistence trouble degrades to "no history" and a `false`
/// answer rather than blocking the normal startup path.
pub struct CrashLoopDetector {
    crash_report_path: PathBuf,
    threshold: usize,
    store: StartupEventStore,
    // Serializes the load-append-evict-count-save sequence per instance.
    events: Mutex<Vec<StartupEvent>>,
    consecutive_crashes: AtomicUsize,
}

impl CrashLoopDetector {
    /// A zero `threshold` is normalized to [`DEFAULT_CRASH_LOOP_THRESHOLD`].
    pub fn new(
        crash_report_path: impl Into<PathBuf>,
        store: Box<dyn KeyValueStore>,
        threshold: usize,
    ) -> Self {
        let threshold = if threshold == 0 {
            DEFAULT_CRASH_LOOP_THRESHOLD
        } else {
            threshold
        };
        Self {
            crash_report_path: crash_report_path.into(),
            threshold,
            store: StartupEventStore::new(store),
            events: Mutex::new(Vec::new()),
            consecutive_crashes: AtomicUsize::new(0),
        }
    }

    pub fn crash_report_path(&self) -> &Path {
        &self.crash_report_path
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Failure count in the window as of the last evaluation.
    pub fn consecutive_crashes(&self) -> usize {
        self.consecutive_crashes.load(SeqCst)
    }

    /// Records the current launch and answers whether the last `threshold`
    /// launches all failed. Always returns a decision; the updated window is
    /// persisted unconditionally, even when loading it failed.
    pub fn detect_crash_loop(&self) -> bool {
        let mut events = self.lock();
        *events = self.store.load();

        let event = StartupEvent {
            timestamp: unix_timestamp(),
            is_successful: !self.crash_report_path.exists(),
        };
        debug!(
            "startup event at {}: successful={}",
            event.timestamp, event.is_successful
        );
        StartupEventStore::record(&mut events, event, self.threshold);

        let bad_count = events.iter().filter(|e| !e.is_successful).count();
        self.consecutive_crashes.store(bad_count, SeqCst);
        self.store.save(&events);

        bad_count >= self.threshold
    }

    /// Clears the persisted window, used after a recovery flow acknowledged
    /// the loop.
    pub fn reset(&self) {
        let mut events = self.lock();
        events.clear();
        self.consecutive_crashes.store(0, SeqCst);
        self.store.save(&events);
    }

    /// Removes the crash artifact and clears the window, letting the
    /// application forgive a detected crash without waiting for the window to
    /// clear naturally.
    pub fn delete_crash_report(&self) {
        match std::fs::remove_file(&self.crash_report_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove crash artifact {}: {err}",
                self.crash_report_path.display()
            ),
        }
        self.reset();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StartupEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_value::MemoryKeyValueStore;
    use crate::startup_events::STARTUP_EVENTS_KEY;
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        artifact: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let artifact = dir.path().join("live_report.dmp");
            Self {
                _dir: dir,
                artifact,
            }
        }

        fn detector(&self, threshold: usize) -> CrashLoopDetector {
            CrashLoopDetector::new(
                &self.artifact,
                Box::new(MemoryKeyValueStore::default()),
                threshold,
            )
        }

        fn crash(&self) {
            std::fs::write(&self.artifact, b"minidump").unwrap();
        }

        fn recover(&self) {
            let _ = std::fs::remove_file(&self.artifact);
        }
    }

    #[test]
    fn five_consecutive_crashes_trip_the_detector() {
        let fixture = Fixture::new();
        let detector = fixture.detector(0);
        fixture.crash();
        for _ in 0..4 {
            assert!(!detector.detect_crash_loop());
        }
        assert!(detector.detect_crash_loop());
        assert_eq!(detector.consecutive_crashes(), 5);
    }

    #[test]
    fn one_success_in_the_window_resets_loop_status() {
        let fixture = Fixture::new();
        let detector = fixture.detector(0);
        fixture.crash();
        for _ in 0..3 {
            assert!(!detector.detect_crash_loop());
        }
        fixture.recover();
        assert!(!detector.detect_crash_loop());
        fixture.crash();
        assert!(!detector.detect_crash_loop());
        assert_eq!(detector.consecutive_crashes(), 4);
    }

    #[test]
    fn zero_threshold_is_normalized_to_the_default() {
        let fixture = Fixture::new();
        assert_eq!(
            fixture.detector(0).threshold(),
            DEFAULT_CRASH_LOOP_THRESHOLD
        );
    }

    #[test]
    fn custom_threshold_is_honored() {
        let fixture = Fixture::new();
        let detector = fixture.detector(2);
        fixture.crash();
        assert!(!detector.detect_crash_loop());
        assert!(detector.detect_crash_loop());
    }

    #[test]
    fn reset_clears_prior_all_failure_history() {
        let fixture = Fixture::new();
        let detector = fixture.detector(0);
        fixture.crash();
        for _ in 0..5 {
            detector.detect_crash_loop();
        }
        detector.reset();
        assert_eq!(detector.consecutive_crashes(), 0);
        fixture.recover();
        assert!(!detector.detect_crash_loop());
    }

    #[test]
    fn delete_crash_report_removes_the_artifact_and_the_window() {
        let fixture = Fixture::new();
        let detector = fixture.detector(0);
        fixture.crash();
        detector.detect_crash_loop();
        detector.delete_crash_report();
        assert!(!fixture.artifact.exists());
        // Next evaluation starts from a single fresh (successful) event.
        assert!(!detector.detect_crash_loop());
        assert_eq!(detector.consecutive_crashes(), 0);
    }

    #[test]
    fn delete_crash_report_without_an_artifact_is_harmless() {
        let fixture = Fixture::new();
        let detector = fixture.detector(0);
        detector.delete_crash_report();
        assert!(!detector.detect_crash_loop());
    }

    #[test]
    fn corrupt_history_is_treated_as_empty_and_overwritten() {
        let fixture = Fixture::new();
        let kv = Arc::new(MemoryKeyValueStore::default());
        kv.set(STARTUP_EVENTS_KEY, b"\x00 definitely not json");
        let detector =
            CrashLoopDetector::new(&fixture.artifact, Box::new(SharedStore(kv.clone())), 0);
        assert!(!detector.detect_crash_loop());
        // The window was re-persisted as valid JSON with one event.
        let events: Vec<StartupEvent> =
            serde_json::from_slice(&kv.get(STARTUP_EVENTS_KEY).unwrap()).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].is_successful);
    }

    #[test]
    fn window_persists_across_detector_instances() {
        let fixture = Fixture::new();
        let kv = Arc::new(MemoryKeyValueStore::default());
        fixture.crash();
        for _ in 0..4 {
            let detector =
                CrashLoopDetector::new(&fixture.artifact, Box::new(SharedStore(kv.clone())), 0);
            assert!(!detector.detect_crash_loop());
        }
        let detector =
            CrashLoopDetector::new(&fixture.artifact, Box::new(SharedStore(kv.clone())), 0);
        assert!(detector.detect_crash_loop());
    }

    #[test]
    fn window_never_exceeds_the_threshold() {
        let fixture = Fixture::new();
        let kv = Arc::new(MemoryKeyValueStore::default());
        let detector =
            CrashLoopDetector::new(&fixture.artifact, Box::new(SharedStore(kv.clone())), 3);
        fixture.crash();
        for _ in 0..10 {
            detector.detect_crash_loop();
        }
        let events: Vec<StartupEvent> =
            serde_json::from_slice(&kv.get(STARTUP_EVENTS_KEY).unwrap()).unwrap();
        assert_eq!(events.len(), 3);
    }

    /// Lets one in-memory store back several detector instances.
    struct SharedStore(Arc<MemoryKeyValueStore>);

    impl KeyValueStore for SharedStore {
        fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> bool {
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> bool {
            self.0.remove(key)
        }
    }
}
