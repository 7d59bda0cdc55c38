//! Timeout-bounded shell execution under the sandbox root.

use std::path::Path;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::ToolError;

/// Runs a shell command with the sandbox root as working directory.
///
/// The command has already passed [`crate::sandbox::CommandFilter`].
/// Wall-clock duration is capped by `timeout`; on expiry the child is
/// killed (`kill_on_drop` — dropping the output future reaps it) and a
/// `Timeout` error is returned instead of partial output.
///
/// Returns stdout if non-empty, else stderr, else an empty string.
pub async fn run_command(
    command: &str,
    workdir: &Path,
    timeout: Duration,
) -> Result<String, ToolError> {
    debug!("Executing command in {}: {command}", workdir.display());

    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .kill_on_drop(true)
        .output();

    let output = tokio::time::timeout(timeout, output)
        .await
        .map_err(|_| ToolError::Timeout(timeout.as_secs()))??;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    // Raw emptiness, not trimmed: whitespace-only stdout still counts
    // as output and wins over stderr.
    let text = if !stdout.is_empty() {
        stdout.into_owned()
    } else if !stderr.is_empty() {
        stderr.into_owned()
    } else {
        String::new()
    };

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command("echo hello", dir.path(), TIMEOUT).await.unwrap();
        assert_eq!(out, "hello\n");
    }

    #[tokio::test]
    async fn test_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command("echo oops >&2", dir.path(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(out, "oops\n");
    }

    #[tokio::test]
    async fn test_whitespace_stdout_wins_over_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command("echo; echo err >&2", dir.path(), TIMEOUT)
            .await
            .unwrap();
        // stdout is a bare newline — non-empty, so stderr is not used
        assert_eq!(out, "\n");
    }

    #[tokio::test]
    async fn test_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_command("true", dir.path(), TIMEOUT).await.unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn test_runs_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();

        let out = run_command("ls", dir.path(), TIMEOUT).await.unwrap();
        assert_eq!(out, "marker.txt\n");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_command(
            "sleep 0.3 && touch marker.txt",
            dir.path(),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(ToolError::Timeout(_))));

        // The child was killed, not left running: give it time to have
        // finished if it survived, then check it never got to `touch`.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(!dir.path().join("marker.txt").exists());
    }
}
