//! In-memory transport for pool and dispatcher tests.

use super::*;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    close_attempts: AtomicUsize,
    connect_error: Mutex<Option<ConnectError>>,
    responses: Mutex<HashMap<String, Result<ExecOutput, String>>>,
    executed: Mutex<Vec<String>>,
}

/// Connector that hands out [`MockSession`]s and records what they run.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<MockState>,
    connect_delay: Option<Duration>,
    exec_delay: Option<Duration>,
    close_delay: Option<Duration>,
    failing_close: bool,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    pub(crate) fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = Some(delay);
        self
    }

    pub(crate) fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    pub(crate) fn with_failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }

    /// Makes every following connect fail with `err` (`None` restores).
    pub(crate) fn fail_connects(&self, err: Option<ConnectError>) {
        *self.state.connect_error.lock().unwrap() = err;
    }

    pub(crate) fn respond_with(&self, command: &str, output: ExecOutput) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Ok(output));
    }

    pub(crate) fn respond(&self, command: &str, stdout: &str) {
        self.respond_with(
            command,
            ExecOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            },
        );
    }

    pub(crate) fn fail_command(&self, command: &str, cause: &str) {
        self.state
            .responses
            .lock()
            .unwrap()
            .insert(command.to_string(), Err(cause.to_string()));
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn close_attempts(&self) -> usize {
        self.state.close_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.state.executed.lock().unwrap().clone()
    }
}

pub(crate) struct MockSession {
    alive: AtomicBool,
    state: Arc<MockState>,
    exec_delay: Option<Duration>,
    close_delay: Option<Duration>,
    failing_close: bool,
}

impl MockSession {
    /// Simulates the transport dropping.
    pub(crate) fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, _target: &Target) -> Result<MockSession, ConnectError> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.state.connect_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            alive: AtomicBool::new(true),
            state: self.state.clone(),
            exec_delay: self.exec_delay,
            close_delay: self.close_delay,
            failing_close: self.failing_close,
        })
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectError> {
        if let Some(delay) = self.exec_delay {
            tokio::time::sleep(delay).await;
        }
        if !self.is_alive() {
            return Err(ConnectError::Execution {
                command: command.to_string(),
                cause: "session closed mid-command".to_string(),
            });
        }
        self.state
            .executed
            .lock()
            .unwrap()
            .push(command.to_string());
        let response = self.state.responses.lock().unwrap().get(command).cloned();
        match response {
            Some(Ok(output)) => Ok(output),
            Some(Err(cause)) => Err(ConnectError::Execution {
                command: command.to_string(),
                cause,
            }),
            None => Ok(ExecOutput::default()),
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), ConnectError> {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        self.state.close_attempts.fetch_add(1, Ordering::SeqCst);
        self.kill();
        if self.failing_close {
            Err(ConnectError::ConnectClosedError)
        } else {
            Ok(())
        }
    }
}
