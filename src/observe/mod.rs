//! Logger and monitor collaborator contracts.
//!
//! Both collaborators are optional from the engine's point of view: the
//! workflow always has a logger (defaulting to [`TracingLogger`]) and may
//! have a monitor attached. Neither can fail a run.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// ============= Logger =============

/// Leveled logging capability consumed by the engine.
///
/// Each method takes a message plus a context mapping of structured fields.
pub trait Logger: Send + Sync {
    /// Log at debug level.
    fn debug(&self, message: &str, context: &Map<String, Value>);
    /// Log at info level.
    fn info(&self, message: &str, context: &Map<String, Value>);
    /// Log at warn level.
    fn warn(&self, message: &str, context: &Map<String, Value>);
    /// Log at error level.
    fn error(&self, message: &str, context: &Map<String, Value>);
}

/// Default logger that forwards to the `tracing` macros.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str, context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::debug!(context = %context, "{}", message);
    }

    fn info(&self, message: &str, context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::info!(context = %context, "{}", message);
    }

    fn warn(&self, message: &str, context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::warn!(context = %context, "{}", message);
    }

    fn error(&self, message: &str, context: &Map<String, Value>) {
        let context = Value::Object(context.clone());
        tracing::error!(context = %context, "{}", message);
    }
}

// ============= Monitor =============

/// Opaque handle returned by monitor begin/start operations.
///
/// Handles are only meaningful to the monitor that issued them; a stale or
/// foreign handle is ignored rather than treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorHandle(u64);

/// Process and timer instrumentation consumed by the engine.
///
/// The executor brackets each run in a begin/end process pair and each step
/// in a start/stop timer keyed by step id.
pub trait Monitor: Send + Sync {
    /// Mark the start of a named process.
    fn begin_process(&self, name: &str) -> MonitorHandle;

    /// Mark the end of a previously begun process.
    fn end_process(&self, handle: MonitorHandle);

    /// Start a named timer.
    fn start_timer(&self, name: &str) -> MonitorHandle;

    /// Stop a running timer and return its elapsed time, if the handle is
    /// still live.
    fn stop_timer(&self, handle: MonitorHandle) -> Option<Duration>;
}

/// Monitor that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl Monitor for NoopMonitor {
    fn begin_process(&self, _name: &str) -> MonitorHandle {
        MonitorHandle(0)
    }

    fn end_process(&self, _handle: MonitorHandle) {}

    fn start_timer(&self, _name: &str) -> MonitorHandle {
        MonitorHandle(0)
    }

    fn stop_timer(&self, _handle: MonitorHandle) -> Option<Duration> {
        None
    }
}

/// In-memory monitor that records finished processes and timers.
///
/// Mainly useful in tests, where it makes instrumentation observable
/// without a metrics backend.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    next_handle: AtomicU64,
    open: Mutex<HashMap<MonitorHandle, (String, Instant)>>,
    finished: Mutex<Vec<(String, Duration)>>,
}

impl RecordingMonitor {
    /// Create an empty recording monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names and durations of everything that has been ended or stopped,
    /// in completion order.
    pub fn finished(&self) -> Vec<(String, Duration)> {
        self.finished.lock().clone()
    }

    /// Number of processes/timers begun but not yet ended.
    pub fn open_count(&self) -> usize {
        self.open.lock().len()
    }

    fn open_entry(&self, name: &str) -> MonitorHandle {
        let handle = MonitorHandle(self.next_handle.fetch_add(1, Ordering::Relaxed) + 1);
        self.open
            .lock()
            .insert(handle, (name.to_string(), Instant::now()));
        handle
    }

    fn close_entry(&self, handle: MonitorHandle) -> Option<Duration> {
        let (name, started) = self.open.lock().remove(&handle)?;
        let elapsed = started.elapsed();
        self.finished.lock().push((name, elapsed));
        Some(elapsed)
    }
}

impl Monitor for RecordingMonitor {
    fn begin_process(&self, name: &str) -> MonitorHandle {
        self.open_entry(name)
    }

    fn end_process(&self, handle: MonitorHandle) {
        self.close_entry(handle);
    }

    fn start_timer(&self, name: &str) -> MonitorHandle {
        self.open_entry(name)
    }

    fn stop_timer(&self, handle: MonitorHandle) -> Option<Duration> {
        self.close_entry(handle)
    }
}
