//! Build-log sink and outcome callback supplied by the CI host.

use crate::classify::Outcome;
use std::sync::Mutex;

/// What the surrounding build exposes to a dispatch: a line-oriented log and
/// a way to record the step's result.
pub trait BuildListener: Send + Sync {
    fn info(&self, line: &str);
    fn error(&self, line: &str);
    fn set_outcome(&self, outcome: Outcome);
}

/// Writes the build log to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleListener {
    outcome: Mutex<Option<Outcome>>,
}

impl ConsoleListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last outcome recorded by the dispatcher, if any.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().ok().and_then(|guard| *guard)
    }
}

impl BuildListener for ConsoleListener {
    fn info(&self, line: &str) {
        println!("{line}");
    }

    fn error(&self, line: &str) {
        eprintln!("ERROR: {line}");
    }

    fn set_outcome(&self, outcome: Outcome) {
        if let Ok(mut guard) = self.outcome.lock() {
            *guard = Some(outcome);
        }
    }
}

/// Keeps the build log in memory.
#[derive(Debug, Default)]
pub struct MemoryListener {
    info: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    outcome: Mutex<Option<Outcome>>,
}

impl MemoryListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info_lines(&self) -> Vec<String> {
        self.info.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn error_lines(&self) -> Vec<String> {
        self.errors.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.lock().ok().and_then(|guard| *guard)
    }
}

impl BuildListener for MemoryListener {
    fn info(&self, line: &str) {
        if let Ok(mut lines) = self.info.lock() {
            lines.push(line.to_string());
        }
    }

    fn error(&self, line: &str) {
        if let Ok(mut lines) = self.errors.lock() {
            lines.push(line.to_string());
        }
    }

    fn set_outcome(&self, outcome: Outcome) {
        if let Ok(mut guard) = self.outcome.lock() {
            *guard = Some(outcome);
        }
    }
}
