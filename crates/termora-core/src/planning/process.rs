//! Planner backed by an external command.
//!
//! The command runs through `sh -c`, receives the [`PlanRequest`] as JSON on
//! stdin and prints a [`ProposedPlan`] on stdout. Any wrapper around a
//! hosted or local model fits behind this seam.

use std::{path::PathBuf, process::Stdio};

use async_trait::async_trait;
use log::debug;
use tokio::{io::AsyncWriteExt, process::Command};

use super::{PlanProvider, PlanRequest, ProposedPlan};
use crate::error::{Result, TermoraError};

#[derive(Debug, Clone)]
pub struct ProcessProvider {
    command: String,
    cwd: Option<PathBuf>,
}

impl ProcessProvider {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

fn planning_failure(message: impl Into<String>) -> TermoraError {
    TermoraError::PlanningFailure {
        message: message.into(),
    }
}

#[async_trait]
impl PlanProvider for ProcessProvider {
    async fn propose_plan(&self, request: &PlanRequest) -> Result<ProposedPlan> {
        let input = serde_json::to_vec(request)?;
        debug!("Running planner command `{}`", self.command);

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| planning_failure(format!("cannot start planner: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A planner that ignores stdin may close it early
            if let Err(e) = stdin.write_all(&input).await {
                debug!("Planner closed stdin: {e}");
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| planning_failure(format!("planner did not finish: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(planning_failure(format!(
                "planner exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        ProposedPlan::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use crate::context::SessionContext;

    use super::*;

    fn request(intent: &str) -> PlanRequest {
        PlanRequest::new(intent, SessionContext::new("/tmp"))
    }

    #[tokio::test]
    async fn test_reads_plan_from_stdout() {
        let provider = ProcessProvider::new(
            r#"cat > /dev/null; echo 'Plan: {"actions": [{"type": "shell_command", "content": "echo planned"}]}'"#,
        );
        let proposal = provider.propose_plan(&request("say hi")).await.unwrap();
        assert_eq!(proposal.actions[0].content, "echo planned");
    }

    #[tokio::test]
    async fn test_request_arrives_on_stdin() {
        // Echo the intent back as the single command
        let provider = ProcessProvider::new(
            r#"read -r line; case "$line" in *'"intent":"count files"'*) echo '{"actions":[{"type":"shell_command","content":"ls | wc -l"}]}';; *) exit 3;; esac"#,
        );
        let proposal = provider.propose_plan(&request("count files")).await.unwrap();
        assert_eq!(proposal.actions[0].content, "ls | wc -l");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_planning_failure() {
        let provider = ProcessProvider::new("echo boom >&2; exit 2");
        let err = provider.propose_plan(&request("anything")).await.unwrap_err();
        match err {
            TermoraError::PlanningFailure { message } => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_prose_only_is_malformed() {
        let provider = ProcessProvider::new("cat > /dev/null; echo 'sorry, no idea'");
        let err = provider.propose_plan(&request("anything")).await.unwrap_err();
        assert!(matches!(err, TermoraError::MalformedPlan { .. }));
    }
}
