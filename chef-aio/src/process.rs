// chef-aio/src/process.rs
use std::process::{Output as StdOutput, Stdio};

use chef_common::error::{ChefError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Asynchronously runs an external command and captures its output.
pub async fn run_command_async(command: &str, args: &[String]) -> Result<StdOutput> {
    debug!("Async Running command: {} {:?}", command, args);

    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd.kill_on_drop(true);

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());

    match cmd.output().await {
        Ok(output) => {
            if !output.status.success() {
                debug!("Async Command failed with status: {}", output.status);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Async Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Async Failed to execute command {}: {}", command, e);
            Err(ChefError::CommandExecError(format!("{command}: {e}")))
        }
    }
}

/// Program and leading arguments that run `line` through the platform shell.
pub fn shell_invocation(line: &str) -> (String, Vec<String>) {
    if cfg!(windows) {
        ("cmd".to_string(), vec!["/C".to_string(), line.to_string()])
    } else {
        ("sh".to_string(), vec!["-c".to_string(), line.to_string()])
    }
}

/// Runs a shell command line and returns its trimmed stdout, failing on a
/// non-zero exit status.
pub async fn run_shell_capture(line: &str) -> Result<String> {
    let (program, args) = shell_invocation(line);
    let output = run_command_async(&program, &args).await?;
    if !output.status.success() {
        return Err(ChefError::CommandExecError(format!(
            "`{line}` exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shell_capture_trims_stdout() {
        let out = run_shell_capture("echo '  1.2.3  '").await.unwrap();
        assert_eq!(out, "1.2.3");
    }

    #[tokio::test]
    async fn shell_capture_fails_on_non_zero_exit() {
        let err = run_shell_capture("exit 3").await.unwrap_err();
        assert!(matches!(err, ChefError::CommandExecError(_)));
    }
}
