// src/engine/shell_task.rs

//! Task that runs a shell command as a child process.

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::engine::task::{EngineTask, TaskFuture};

/// Runs `cmd` through the platform shell.
///
/// stdout and stderr are drained line by line into `debug` logs so the pipes
/// never fill. A non-zero exit is an error carrying the exit code.
#[derive(Debug, Clone)]
pub struct ShellTask {
    id: String,
    cmd: String,
    env: Vec<(String, String)>,
}

impl ShellTask {
    pub fn new(id: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cmd: cmd.into(),
            env: Vec::new(),
        }
    }

    /// Extra environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run_inner(&self) -> Result<()> {
        info!(task = %self.id, cmd = %self.cmd, "starting task process");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.id))?;

        if let Some(stdout) = child.stdout.take() {
            let id = self.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %id, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let id = self.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(task = %id, "stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for process of task '{}'", self.id))?;

        let code = status.code().unwrap_or(-1);
        info!(task = %self.id, exit_code = code, success = status.success(), "task process exited");

        if !status.success() {
            bail!("command exited with code {code}");
        }
        Ok(())
    }
}

impl EngineTask for ShellTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn run(&self) -> TaskFuture<'_> {
        Box::pin(self.run_inner())
    }
}
