//! Command-interface transport.
//!
//! The console's line-oriented commands run over ssh. [`SshTransport`]
//! shells out through the local ssh client; [`ScriptedTransport`] replays
//! canned responses for tests and records every command it was asked to
//! run.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::TransportError;

/// A handle that executes console commands.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    /// Execute one command and return its stdout.
    async fn execute(&self, command: &str) -> Result<String, TransportError>;
}

/// Command transport over the local ssh client.
pub struct SshTransport {
    host: String,
    username: String,
    password: Option<String>,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password,
        }
    }
}

#[async_trait]
impl CommandTransport for SshTransport {
    async fn execute(&self, command: &str) -> Result<String, TransportError> {
        let destination = format!("{}@{}", self.username, self.host);
        debug!(host = %self.host, command, "executing console command");

        // Password auth goes through sshpass reading SSHPASS from the
        // environment so the secret never appears in the argument list.
        let mut cmd = if let Some(password) = &self.password {
            let mut c = Command::new("sshpass");
            c.arg("-e").env("SSHPASS", password).arg("ssh");
            c
        } else {
            let mut c = Command::new("ssh");
            c.arg("-o").arg("BatchMode=yes");
            c
        };

        let output = cmd
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg(&destination)
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| TransportError::Session(format!("failed to spawn ssh: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                stdout
            } else {
                stderr.to_string()
            };
            Err(TransportError::command(message.trim().to_string()))
        }
    }
}

/// Scripted transport for tests.
///
/// Responses are consumed in FIFO order; running out of script is a test
/// bug and fails loudly. Every executed command is recorded for
/// call-count assertions.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<String, TransportError>>>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(self, body: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(body.into()));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: TransportError) -> Self {
        self.responses.lock().unwrap().push_back(Err(err));
        self
    }

    /// Commands executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Number of executed commands whose text starts with `prefix`.
    pub fn count_matching(&self, prefix: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

#[async_trait]
impl CommandTransport for ScriptedTransport {
    async fn execute(&self, command: &str) -> Result<String, TransportError> {
        self.executed.lock().unwrap().push(command.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => Err(TransportError::Session(format!(
                "scripted transport exhausted at command: {command}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_transport_replays_in_order() {
        let transport = ScriptedTransport::new().respond("first").respond("second");

        assert_eq!(transport.execute("cmd-a").await.unwrap(), "first");
        assert_eq!(transport.execute("cmd-b").await.unwrap(), "second");
        assert_eq!(transport.executed(), vec!["cmd-a", "cmd-b"]);
    }

    #[tokio::test]
    async fn scripted_transport_exhaustion_is_an_error() {
        let transport = ScriptedTransport::new();
        let err = transport.execute("anything").await.unwrap_err();
        assert!(matches!(err, TransportError::Session(_)));
    }

    #[tokio::test]
    async fn count_matching_filters_by_prefix() {
        let transport = ScriptedTransport::new().respond("a").respond("b");
        transport.execute("chsysstate -m sys1 -r sys -o on").await.unwrap();
        transport.execute("lssyscfg -r sys -m sys1").await.unwrap();

        assert_eq!(transport.count_matching("chsysstate"), 1);
        assert_eq!(transport.count_matching("lssyscfg"), 1);
        assert_eq!(transport.count_matching("chhwres"), 0);
    }
}
