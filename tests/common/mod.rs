//! Scripted RouterOS device used by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rosbridge::error::{ConnectError, FailureKind};
use rosbridge::session::{Connector, ExecOutput, RemoteSession, Target};

#[derive(Default)]
struct Device {
    connects: AtomicUsize,
    unreachable: AtomicBool,
    replies: Mutex<HashMap<String, String>>,
    log: Mutex<Vec<String>>,
}

/// Connector whose sessions answer from a command → stdout table.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    device: Arc<Device>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, command: &str, stdout: &str) -> &Self {
        self.device
            .replies
            .lock()
            .unwrap()
            .insert(command.to_string(), stdout.to_string());
        self
    }

    pub fn go_offline(&self) {
        self.device.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.device.connects.load(Ordering::SeqCst)
    }

    /// Every command the device received, in order.
    pub fn commands(&self) -> Vec<String> {
        self.device.log.lock().unwrap().clone()
    }
}

pub struct ScriptedSession {
    device: Arc<Device>,
    open: AtomicBool,
}

#[async_trait]
impl Connector for ScriptedDevice {
    type Session = ScriptedSession;

    async fn connect(&self, target: &Target) -> Result<ScriptedSession, ConnectError> {
        if self.device.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectError::Connect {
                target: target.key(),
                kind: FailureKind::Refused,
                cause: "Connection refused (os error 111)".to_string(),
            });
        }
        self.device.connects.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            device: self.device.clone(),
            open: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectError> {
        self.device.log.lock().unwrap().push(command.to_string());
        let stdout = self
            .device
            .replies
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default();
        Ok(ExecOutput {
            stdout,
            ..Default::default()
        })
    }

    fn is_alive(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), ConnectError> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

pub fn target() -> Target {
    Target::new("192.168.88.1", None, "admin", "s3cret")
}
