//! Runner command-line construction.
//!
//! The runner is an opaque executable with a fixed flag contract:
//!
//! ```text
//! [mono] "<runner>" /msgServer="<server>" /project="<path>" /test="<path>"|/list="<path>"
//!     [/deviceId="<id>"] /output="<path>" /resultType=1|2
//! ```
//!
//! Flag order is part of that contract and must not change.

use crate::invocation::{InvocationSpec, RESULTS_DIR, RUNNER_BINARY};
use crate::paths::normalize;
use crate::platform::{ExecutionEnvironment, OsFamily};

/// Resolve the runner executable from an installation path.
///
/// A directory path (trailing separator) gets the binary name appended; a path
/// that does not already name the binary (case-insensitive) gets a separator
/// and the binary name appended.
pub fn runner_executable(runner_path: &str, os: OsFamily) -> String {
    let sep = os.separator();
    if runner_path.ends_with(sep) {
        format!("{runner_path}{RUNNER_BINARY}")
    } else if !runner_path
        .to_lowercase()
        .ends_with(&RUNNER_BINARY.to_lowercase())
    {
        format!("{runner_path}{sep}{RUNNER_BINARY}")
    } else {
        runner_path.to_string()
    }
}

/// The leading executable token, wrapped in the managed-runtime launcher on
/// POSIX hosts. A launcher containing whitespace is quoted.
fn executable_token(spec: &InvocationSpec, os: OsFamily) -> String {
    let executable = runner_executable(spec.runner_path(), os);
    match os {
        OsFamily::Posix => {
            let launcher = spec.launcher();
            if launcher.contains(char::is_whitespace) {
                format!("\"{launcher}\" \"{executable}\"")
            } else {
                format!("{launcher} \"{executable}\"")
            }
        }
        OsFamily::Windows => format!("\"{executable}\""),
    }
}

/// Build the full runner command line for one invocation.
pub fn build(spec: &InvocationSpec, env: &ExecutionEnvironment, output_file_name: &str) -> String {
    let os = env.os_family;
    let root = env.workspace_root.as_str();

    let mut parts = vec![
        executable_token(spec, os),
        format!("/msgServer=\"{}\"", spec.message_server()),
        format!("/project=\"{}\"", normalize(root, spec.project_root(), os)),
        format!("/{}=\"{}\"", spec.test_mode(), spec.test_path()),
    ];

    if let Some(device_id) = spec.device_id() {
        parts.push(format!("/deviceId=\"{device_id}\""));
    }

    let output = format!("{RESULTS_DIR}{}{output_file_name}", os.separator());
    parts.push(format!("/output=\"{}\"", normalize(root, &output, os)));
    parts.push(format!("/resultType={}", spec.result_type()));

    parts.join(" ")
}

/// Split a command line into argv.
///
/// Tokens are separated by whitespace; double quotes group a span into one
/// token and are dropped. `/project="/a b"` becomes `/project=/a b`.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    tokens
}
