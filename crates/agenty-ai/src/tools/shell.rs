//! Shell command execution tool

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::error::{AiError, Result};
use crate::tools::traits::{Tool, ToolDefinition, ToolParameters};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Run a shell command and return exit code, stdout, and stderr.
#[derive(Default)]
pub struct RunShellCommandTool;

impl RunShellCommandTool {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Deserialize)]
struct ShellArgs {
    command: String,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

#[async_trait]
impl Tool for RunShellCommandTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_shell_command".to_string(),
            description:
                "Execute a shell command on the local machine and return its output. Supports Windows (PowerShell), Linux, and macOS (sh). Returns stdout, stderr, and exit code."
                    .to_string(),
            parameters: ToolParameters::object()
                .property(
                    "command",
                    "string",
                    "The shell command to execute. On Windows this runs via PowerShell -Command, on Linux/macOS via sh -c.",
                )
                .property(
                    "workdir",
                    "string",
                    "Optional working directory for the command. Defaults to the current working directory if not specified.",
                )
                .property(
                    "timeout",
                    "integer",
                    "Optional timeout in seconds. Defaults to 30. The command will be killed if it exceeds this duration.",
                )
                .required(&["command"]),
        }
    }

    async fn execute(&self, arguments: &str) -> Result<String> {
        let args: ShellArgs =
            serde_json::from_str(arguments).map_err(|err| AiError::InvalidArguments(err.to_string()))?;

        if args.command.trim().is_empty() {
            return Err(AiError::InvalidArguments(
                "command must not be empty".to_string(),
            ));
        }

        let timeout_secs = args.timeout.filter(|t| *t > 0).unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut cmd = shell_command(&args.command);
        if let Some(workdir) = &args.workdir {
            let dir = Path::new(workdir);
            if !dir.exists() {
                return Err(AiError::Tool(format!(
                    "working directory does not exist: {}",
                    workdir
                )));
            }
            if !dir.is_dir() {
                return Err(AiError::Tool(format!(
                    "working directory path is not a directory: {}",
                    workdir
                )));
            }
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(Duration::from_secs(timeout_secs), cmd.output())
            .await
            .map_err(|_| {
                AiError::Tool(format!("command timed out after {} seconds", timeout_secs))
            })?
            .map_err(|err| AiError::Tool(format!("failed to run command: {}", err)))?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = format!("Exit Code: {}\n", exit_code);
        if !stdout.is_empty() {
            result.push_str("Stdout:\n");
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            result.push_str("Stderr:\n");
            result.push_str(&stderr);
        }
        if stdout.is_empty() && stderr.is_empty() {
            result.push_str("(no output)");
        }

        Ok(result)
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simple_command_reports_exit_code_and_stdout() {
        let tool = RunShellCommandTool::new();
        let output = tool
            .execute("{\"command\": \"echo hello\"}")
            .await
            .unwrap();

        assert!(output.starts_with("Exit Code: 0\n"));
        assert!(output.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_errored() {
        let tool = RunShellCommandTool::new();
        let output = tool.execute("{\"command\": \"exit 3\"}").await.unwrap();

        assert!(output.starts_with("Exit Code: 3\n"));
        assert!(output.contains("(no output)"));
    }

    #[tokio::test]
    async fn stderr_is_captured() {
        let tool = RunShellCommandTool::new();
        let output = tool
            .execute("{\"command\": \"echo oops >&2\"}")
            .await
            .unwrap();

        assert!(output.contains("Stderr:\noops"));
    }

    #[tokio::test]
    async fn workdir_is_honored() {
        let dir = tempfile::tempdir().unwrap();
        let tool = RunShellCommandTool::new();
        let args = format!("{{\"command\": \"pwd\", \"workdir\": \"{}\"}}", dir.path().display());
        let output = tool.execute(&args).await.unwrap();

        assert!(output.contains(dir.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn missing_workdir_fails() {
        let tool = RunShellCommandTool::new();
        let err = tool
            .execute("{\"command\": \"true\", \"workdir\": \"/no/such/dir\"}")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn long_command_is_killed_on_timeout() {
        let tool = RunShellCommandTool::new();
        let err = tool
            .execute("{\"command\": \"sleep 5\", \"timeout\": 1}")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("timed out after 1 seconds"));
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let tool = RunShellCommandTool::new();
        assert!(tool.execute("{\"command\": \"   \"}").await.is_err());
    }
}
