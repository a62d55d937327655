//! Executable configuration scripts.
//!
//! A `.sh` source is run as a child process in a constrained environment:
//! the inherited environment is cleared down to a small allow-list, the
//! working directory is pinned to the script's own directory, and the run is
//! bounded by a wall-clock timeout. The export convention is that the script
//! prints exactly one JSON document to stdout; anything else is a parse
//! failure attributed to the script's path.

use crate::error::{ConfigError, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wall-clock limit for one script run.
const SCRIPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variables passed through to the script.
const ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "TZ"];

/// Variables describing the script's own location, replacing a richer
/// ambient environment.
const ENV_SCRIPT_PATH: &str = "STRATA_SCRIPT_PATH";
const ENV_SCRIPT_DIR: &str = "STRATA_SCRIPT_DIR";

/// Run a configuration script and parse its stdout as a tree.
pub fn run(path: &Path, base_dir: &Path) -> Result<Value> {
    debug!(path = %path.display(), "running configuration script");

    let mut command = Command::new("/bin/sh");
    command
        .arg(path)
        .current_dir(base_dir)
        .env_clear()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for var in ENV_ALLOWLIST {
        if let Ok(value) = std::env::var(var) {
            command.env(var, value);
        }
    }
    command.env(ENV_SCRIPT_PATH, path);
    command.env(ENV_SCRIPT_DIR, base_dir);

    let child = command.spawn().map_err(|source| ConfigError::Source {
        path: path.to_path_buf(),
        source,
    })?;

    let (success, stdout, stderr) = wait_with_timeout(child, path)?;
    if !success {
        let detail = stderr.lines().next().unwrap_or("no stderr output");
        return Err(ConfigError::parse(
            path,
            format!("configuration script failed: {detail}"),
        ));
    }

    serde_json::from_str(stdout.trim())
        .map_err(|err| ConfigError::parse(path, format!("script output is not valid JSON: {err}")))
}

/// Wait for the child, killing it once the timeout elapses. Output pipes are
/// drained on separate threads so a chatty script cannot deadlock on a full
/// pipe buffer.
fn wait_with_timeout(mut child: Child, path: &Path) -> Result<(bool, String, String)> {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout_pipe));
    let stderr_thread = std::thread::spawn(move || drain(stderr_pipe));

    let deadline = Instant::now() + SCRIPT_TIMEOUT;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ConfigError::parse(
                        path,
                        format!(
                            "configuration script timed out after {}s",
                            SCRIPT_TIMEOUT.as_secs()
                        ),
                    ));
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(source) => {
                return Err(ConfigError::Source {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();
    Ok((status.success(), stdout, stderr))
}

fn drain(pipe: Option<impl Read>) -> String {
    let mut buffer = String::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_string(&mut buffer);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_script_stdout_becomes_tree() {
        let temp = TempDir::new().unwrap();
        let path = write_script(
            temp.path(),
            "default.sh",
            "echo '{\"server\": {\"port\": 25}}'\n",
        );

        let tree = run(&path, temp.path()).unwrap();
        assert_eq!(tree, json!({"server": {"port": 25}}));
    }

    #[test]
    fn test_script_sees_minimal_environment() {
        let temp = TempDir::new().unwrap();
        let path = write_script(
            temp.path(),
            "env.sh",
            "printf '{\"dir\": \"%s\", \"user\": \"%s\"}' \"$STRATA_SCRIPT_DIR\" \"${USER:-}\"\n",
        );

        let tree = run(&path, temp.path()).unwrap();
        assert_eq!(tree["dir"], json!(temp.path().to_string_lossy()));
        // USER is not on the allow-list, so the script must not see it
        assert_eq!(tree["user"], json!(""));
    }

    #[test]
    fn test_failing_script_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = write_script(temp.path(), "bad.sh", "echo 'boom' >&2\nexit 3\n");

        let err = run(&path, temp.path()).unwrap_err();
        match err {
            ConfigError::Parse { path: p, message } => {
                assert_eq!(p, path);
                assert!(message.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_json_output_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = write_script(temp.path(), "text.sh", "echo 'not json'\n");

        let err = run(&path, temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
