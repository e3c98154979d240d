//! Success/failure classification of a runner report.
//!
//! The runner has no documented status contract. On a completed run it prints
//! a line containing `> Step`; that marker is the primary signal. The exit
//! code is recorded and reported but not used to decide the outcome.

use crate::task::ExecutionReport;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Substring the runner prints on a completed run.
pub const SUCCESS_MARKER: &str = "> Step";

/// Final verdict of a build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Success,
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "SUCCESS"),
            Outcome::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Classify a report by the success marker in its stdout.
pub fn classify(report: &ExecutionReport) -> Outcome {
    if report.stdout_text().contains(SUCCESS_MARKER) {
        if report.exit_code != 0 {
            warn!(
                exit_code = report.exit_code,
                "Runner printed the success marker but exited non-zero"
            );
        }
        Outcome::Success
    } else {
        Outcome::Failure
    }
}

/// Combine the marker verdict with the results-file check.
///
/// A missing results file always fails the step.
pub fn with_result_file(marker_outcome: Outcome, result_file_present: bool) -> Outcome {
    if result_file_present {
        marker_outcome
    } else {
        Outcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OsFamily;

    fn report(stdout: &[&str], exit_code: i32) -> ExecutionReport {
        ExecutionReport {
            os_family: OsFamily::Posix,
            command_line: String::new(),
            stdout_lines: stdout.iter().map(|s| s.to_string()).collect(),
            stderr_lines: Vec::new(),
            exit_code,
        }
    }

    #[test]
    fn marker_present_and_file_present_is_success() {
        let r = report(&["Connecting...", "Build finished > Step 4 passed"], 0);
        assert_eq!(with_result_file(classify(&r), true), Outcome::Success);
    }

    #[test]
    fn marker_present_but_file_missing_is_failure() {
        let r = report(&["Build finished > Step 4 passed"], 0);
        assert_eq!(classify(&r), Outcome::Success);
        assert_eq!(with_result_file(classify(&r), false), Outcome::Failure);
    }

    #[test]
    fn no_marker_is_failure() {
        let r = report(&["Could not connect to message server"], 0);
        assert_eq!(classify(&r), Outcome::Failure);
        assert_eq!(with_result_file(classify(&r), true), Outcome::Failure);
    }

    #[test]
    fn empty_output_is_failure() {
        assert_eq!(classify(&report(&[], 0)), Outcome::Failure);
    }

    #[test]
    fn marker_split_across_lines_does_not_match() {
        assert_eq!(classify(&report(&[">", " Step"], 0)), Outcome::Failure);
    }

    #[test]
    fn exit_code_does_not_override_marker() {
        assert_eq!(classify(&report(&["> Step 1"], 2)), Outcome::Success);
    }

    #[test]
    fn outcome_display_and_serde() {
        assert_eq!(Outcome::Success.to_string(), "SUCCESS");
        assert_eq!(serde_json::to_string(&Outcome::Failure).unwrap(), "\"FAILURE\"");
    }
}
