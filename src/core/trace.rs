//! Slow-query tracing
//!
//! When enabled, every traced statement logs its elapsed time together with the
//! application frames of the call stack, so the log names the business code
//! that issued the query instead of the query layer itself.

use super::connection::{Connection, ResultSet, Statement};
use super::error::Result;
use parking_lot::RwLock;
use std::backtrace::Backtrace;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

const TRACER_MODULE: &str = concat!(env!("CARGO_CRATE_NAME"), "::core::trace::");

/// Times statements and logs where they were issued from
#[derive(Debug)]
pub struct QueryTracer {
    enabled: AtomicBool,
    namespaces: RwLock<Vec<String>>,
}

impl Default for QueryTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTracer {
    /// Create a disabled tracer whose only application namespace is this crate
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(false),
            namespaces: RwLock::new(vec![env!("CARGO_CRATE_NAME").to_string()]),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Count frames under `namespace` (a crate or module path) as application code
    pub fn add_namespace<S: Into<String>>(&self, namespace: S) {
        let namespace = namespace.into();
        let mut namespaces = self.namespaces.write();
        if !namespaces.contains(&namespace) {
            namespaces.push(namespace);
        }
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().clone()
    }

    /// Run `f`, logging its elapsed time and caller when tracing is enabled.
    ///
    /// The trace is logged whether or not `f` succeeds.
    #[track_caller]
    pub fn trace<T>(&self, label: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if !self.is_enabled() {
            return f();
        }

        let caller = Location::caller();
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        let rendered = Backtrace::force_capture().to_string();
        let frames = filter_frames(&rendered, &self.namespaces.read());

        info!(
            "Query took {} seconds at {}: {}\n{}",
            format_elapsed(elapsed),
            caller,
            label,
            frames.join("\n")
        );

        result
    }

    /// Execute a query statement under [`QueryTracer::trace`]
    #[track_caller]
    pub fn execute_query(
        &self,
        connection: &mut dyn Connection,
        statement: &Statement,
    ) -> Result<ResultSet> {
        self.trace(statement.sql(), || connection.execute_query(statement))
    }
}

/// Seconds with millisecond precision, e.g. `1.042`
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{}.{:03}", elapsed.as_secs(), elapsed.subsec_millis())
}

/// Pick the application frames out of a rendered backtrace.
///
/// Leading runtime frames and this module's own frames are skipped; collection
/// stops at the first frame outside `namespaces` once application frames have
/// been seen. Each entry is `function (location)`.
pub fn filter_frames(rendered: &str, namespaces: &[String]) -> Vec<String> {
    let mut frames: Vec<(String, Option<String>)> = Vec::new();

    for line in rendered.lines() {
        let trimmed = line.trim();
        if let Some(location) = trimmed.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                last.1.get_or_insert_with(|| location.to_string());
            }
        } else if let Some((index, name)) = trimmed.split_once(": ") {
            if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
                frames.push((name.to_string(), None));
            }
        }
    }

    let is_app = |name: &str| {
        let name = name.trim_start_matches('<');
        namespaces.iter().any(|ns| {
            name == ns.as_str()
                || name
                    .strip_prefix(ns.as_str())
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    };

    let mut out = Vec::new();
    for (name, location) in frames {
        if name.trim_start_matches('<').starts_with(TRACER_MODULE) {
            continue;
        }
        if is_app(&name) {
            out.push(match location {
                Some(at) => format!("{} ({})", name, at),
                None => name,
            });
        } else if !out.is_empty() {
            break;
        }
    }

    out
}
