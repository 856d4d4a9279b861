//! Remote session management for RouterOS devices.
//!
//! This module owns the pool of live sessions, keyed by `host:port`, and the
//! transport seam the pool drives. The SSH transport is [`SshConnector`];
//! tests plug in their own [`Connector`].
//!
//! # Main Components
//!
//! - [`SessionPool`] - Session pool with acquire/execute/release semantics
//! - [`Target`] - Address and credentials of one device
//! - [`Connector`] / [`RemoteSession`] - Transport traits
//! - [`SshConnector`] - SSH transport built on async-ssh2-tokio

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use async_trait::async_trait;
use log::{debug, info, warn};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use sha2::{Digest, Sha256};

use russh::Preferred;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{self, DEFAULT_SSH_PORT, ManagerConfig};
use crate::error::ConnectError;

pub use client::{SshConnector, SshSession};
pub use manager::SessionPool;
pub use security::{ConnectionSecurityOptions, SecurityLevel};

/// Address and credentials of one RouterOS device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Target {
    /// Device address. Accepts `ip` for compatibility with dashboard payloads.
    #[serde(alias = "ip")]
    pub host: String,
    /// SSH port, 22 when not set.
    #[serde(default)]
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Target {
    pub fn new(
        host: impl Into<String>,
        port: Option<u16>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// Pool key, `host:port`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }

    /// Checks the target before any connection attempt.
    pub fn validate(&self) -> Result<(), ConnectError> {
        let mut errors = Vec::new();
        if self.host.is_empty() {
            errors.push("IP address is required".to_string());
        } else if self.host.parse::<IpAddr>().is_err() {
            errors.push("Invalid IP address format".to_string());
        }
        if self.username.is_empty() {
            errors.push("Username is required".to_string());
        }
        if self.password.is_empty() {
            errors.push("Password is required".to_string());
        }
        if self.port == Some(0) {
            errors.push("Invalid port number".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConnectError::InvalidTarget(errors))
        }
    }

    /// SHA-256 over username and password, used to tell whether a pooled
    /// session was opened with the same credentials.
    pub(crate) fn credential_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.username.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.password.as_bytes());
        hasher.finalize().into()
    }
}

/// Raw result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: u32,
}

/// One authenticated remote session.
///
/// At most one command should be in flight per session.
#[async_trait]
pub trait RemoteSession: Send + Sync + 'static {
    /// Runs a command and collects its output.
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectError>;

    /// Whether the underlying transport is still open.
    fn is_alive(&self) -> bool;

    /// Graceful teardown.
    async fn close(&self) -> Result<(), ConnectError>;
}

/// Establishes authenticated sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: RemoteSession;

    async fn connect(&self, target: &Target) -> Result<Self::Session, ConnectError>;
}

/// Number of handles currently borrowing one pooled session.
#[derive(Debug, Clone, Default)]
struct Borrowers(Arc<AtomicUsize>);

impl Borrowers {
    fn enter(&self) -> Lease {
        self.0.fetch_add(1, Ordering::SeqCst);
        Lease(self.0.clone())
    }
}

/// One borrow of a pooled session, given back on drop.
#[derive(Debug)]
struct Lease(Arc<AtomicUsize>);

impl Lease {
    fn borrowers(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A borrowed reference to a pooled session.
///
/// Callers must not keep it past [`SessionPool::release`]. Clones share one
/// borrow; the borrow ends when the last clone is dropped.
pub struct SessionHandle<S> {
    key: String,
    session: Arc<S>,
    lease: Arc<Lease>,
}

impl<S> Clone for SessionHandle<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            session: self.session.clone(),
            lease: self.lease.clone(),
        }
    }
}

impl<S> fmt::Debug for SessionHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<S> SessionHandle<S> {
    /// Pool key of the session.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// True when both handles refer to the same underlying session.
    pub fn same_session(&self, other: &SessionHandle<S>) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Number of live handles borrowing this session, this one included.
    pub fn borrowers(&self) -> usize {
        self.lease.borrowers()
    }
}

mod client;
mod manager;
mod security;

#[cfg(test)]
pub(crate) mod mock;
