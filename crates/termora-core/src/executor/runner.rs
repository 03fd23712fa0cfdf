//! Subprocess execution with a bounded wait.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use log::{debug, warn};
use tokio::process::Command;

/// Captured result of one subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `-1` when the process was killed or died from a signal
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Runs shell payloads and scripts in a working directory.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    cwd: PathBuf,
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            cwd: cwd.into(),
            timeout,
        }
    }

    /// Runs `payload` through `sh -c`.
    pub async fn run_shell(&self, payload: &str) -> io::Result<ProcessOutput> {
        let mut command = Command::new("sh");
        command.arg("-c").arg(payload);
        self.run(command).await
    }

    /// Writes `body` to a temporary file and runs it with `interpreter`
    /// (a program name optionally followed by arguments).
    pub async fn run_script(&self, interpreter: &str, body: &str) -> io::Result<ProcessOutput> {
        let mut words = interpreter.split_whitespace();
        let program = words.next().unwrap_or("sh");
        let extension = script_extension(program);

        let mut script = tempfile::Builder::new()
            .prefix("termora-script-")
            .suffix(extension)
            .tempfile()?;
        script.write_all(body.as_bytes())?;
        script.flush()?;

        let mut command = Command::new(program);
        command.args(words).arg(script.path());
        // `script` stays alive until the process has finished
        let output = self.run(command).await;
        drop(script);
        output
    }

    async fn run(&self, mut command: Command) -> io::Result<ProcessOutput> {
        command
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = command.spawn()?;
        debug!("Spawned process {:?}", child.id());

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ProcessOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                })
            }
            Err(_) => {
                warn!("Process killed after {}s", self.timeout.as_secs());
                Ok(ProcessOutput {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("timed out after {}s", self.timeout.as_secs()),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: true,
                })
            }
        }
    }
}

fn script_extension(program: &str) -> &'static str {
    let name = program.rsplit('/').next().unwrap_or(program);
    if name.starts_with("python") {
        ".py"
    } else if name == "node" {
        ".js"
    } else if name == "ruby" {
        ".rb"
    } else {
        ".sh"
    }
}
