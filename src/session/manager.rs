use super::*;

use futures::future::join_all;

/// A pooled session, the credentials it was opened with and its borrowers.
struct PooledSession<S> {
    session: Arc<S>,
    credential_hash: [u8; 32],
    borrowers: Borrowers,
}

impl<S> Clone for PooledSession<S> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            credential_hash: self.credential_hash,
            borrowers: self.borrowers.clone(),
        }
    }
}

/// Session pool keyed by `host:port`.
///
/// Inserts, evictions and releases for one key go through the cache's
/// per-key compute lock, so concurrent acquires for the same device share one
/// session and a release never closes a session another handle still
/// borrows. Different keys never wait on each other.
pub struct SessionPool<C: Connector> {
    connector: C,
    config: ManagerConfig,
    cache: Cache<String, PooledSession<C::Session>>,
}

impl SessionPool<SshConnector> {
    /// Creates an SSH-backed pool with the RouterOS security profile.
    pub fn ssh(config: ManagerConfig) -> Self {
        Self::ssh_with_security(config, ConnectionSecurityOptions::default())
    }

    /// Creates an SSH-backed pool with explicit security options.
    pub fn ssh_with_security(
        config: ManagerConfig,
        security_options: ConnectionSecurityOptions,
    ) -> Self {
        let connector = SshConnector::new(&config, security_options);
        Self::new(connector, config)
    }
}

impl<C: Connector> SessionPool<C> {
    /// Creates a pool around a connector.
    pub fn new(connector: C, config: ManagerConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_idle(config.time_to_idle)
            .build();

        Self {
            connector,
            config,
            cache,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the pooled session for the target, or establishes a new one.
    ///
    /// A pooled session is reused only while it is alive and was opened with
    /// the same credentials; otherwise it is evicted and replaced. On failure
    /// nothing is pooled for the key.
    pub async fn acquire(&self, target: &Target) -> Result<SessionHandle<C::Session>, ConnectError> {
        let key = target.key();
        let credential_hash = target.credential_hash();
        let mut failure = None;
        let mut lease = None;

        let outcome = self
            .cache
            .entry(key.clone())
            .and_compute_with(|existing| {
                let failure = &mut failure;
                let lease = &mut lease;
                let key = key.as_str();
                async move {
                    let had_entry = existing.is_some();
                    if let Some(entry) = existing {
                        let pooled = entry.into_value();
                        if pooled.session.is_alive() {
                            if pooled.credential_hash == credential_hash {
                                debug!("Reusing existing connection to {}", key);
                                *lease = Some(pooled.borrowers.enter());
                                return Op::Nop;
                            }
                            debug!("Credentials changed for {}, replacing connection", key);
                            close_quietly(key, pooled.session.as_ref()).await;
                        } else {
                            debug!("Pooled connection {} is closed. Evicting.", key);
                        }
                    } else {
                        debug!("Creating new connection to {}", key);
                    }

                    match self.connector.connect(target).await {
                        Ok(session) => {
                            info!("Connection established to {}", key);
                            let borrowers = Borrowers::default();
                            *lease = Some(borrowers.enter());
                            Op::Put(PooledSession {
                                session: Arc::new(session),
                                credential_hash,
                                borrowers,
                            })
                        }
                        Err(err) => {
                            warn!("Connection to {} failed: {}", key, err);
                            *failure = Some(err);
                            if had_entry { Op::Remove } else { Op::Nop }
                        }
                    }
                }
            })
            .await;

        if let Some(err) = failure {
            return Err(err);
        }

        match (outcome, lease) {
            (
                CompResult::Inserted(entry)
                | CompResult::ReplacedWith(entry)
                | CompResult::Unchanged(entry),
                Some(lease),
            ) => Ok(SessionHandle {
                key,
                session: entry.into_value().session,
                lease: Arc::new(lease),
            }),
            _ => Err(ConnectError::ConnectClosedError),
        }
    }

    /// Runs a command on the session and returns its standard output
    /// verbatim.
    ///
    /// Standard error is logged, never treated as a failure on its own.
    pub async fn execute(
        &self,
        handle: &SessionHandle<C::Session>,
        command: &str,
    ) -> Result<String, ConnectError> {
        debug!("{} executing command: {}", handle.key, command);

        let timeout = self.config.command_timeout;
        let output = match tokio::time::timeout(timeout, handle.session.exec(command)).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!("{} command execution failed: {}", handle.key, err);
                return Err(match err {
                    ConnectError::Execution { .. } => err,
                    other => ConnectError::Execution {
                        command: command.to_string(),
                        cause: other.to_string(),
                    },
                });
            }
            Err(_) => {
                warn!(
                    "{} command timed out after {}ms: {}",
                    handle.key,
                    timeout.as_millis(),
                    command
                );
                return Err(ConnectError::ExecTimeout {
                    command: command.to_string(),
                    timeout,
                });
            }
        };

        if !output.stderr.trim().is_empty() {
            warn!("{} command stderr: {}", handle.key, output.stderr.trim());
        }
        debug!("{} command completed", handle.key);
        Ok(output.stdout)
    }

    /// Best-effort teardown of one session. The pool entry stays in place and
    /// is replaced by the next [`acquire`](Self::acquire) once it is no
    /// longer alive.
    ///
    /// The session stays open while other handles borrow it; the last
    /// borrower to release closes it.
    pub async fn release(&self, handle: &SessionHandle<C::Session>) {
        let _ = self
            .cache
            .entry(handle.key.clone())
            .and_compute_with(|_| async move {
                let others = handle.borrowers().saturating_sub(1);
                if others > 0 {
                    debug!(
                        "Connection {} still borrowed by {} other handle(s), keeping it open",
                        handle.key, others
                    );
                } else {
                    close_quietly(&handle.key, handle.session.as_ref()).await;
                }
                Op::Nop
            })
            .await;
    }

    /// Closes and evicts the session pooled for the target, if any.
    pub async fn remove(&self, target: &Target) {
        let key = target.key();
        if let Some(pooled) = self.cache.remove(&key).await {
            close_quietly(&key, pooled.session.as_ref()).await;
        }
    }

    /// Closes every pooled session concurrently, waits for all of them and
    /// then empties the pool.
    pub async fn release_all(&self) {
        let pooled = self.cache.iter().collect::<Vec<_>>();
        join_all(
            pooled
                .iter()
                .map(|(key, p)| close_quietly(key.as_str(), p.session.as_ref())),
        )
        .await;

        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        info!("All SSH connections closed ({} released)", pooled.len());
    }

    /// Whether a session is pooled for the target (alive or not).
    pub fn contains(&self, target: &Target) -> bool {
        self.cache.contains_key(&target.key())
    }

    /// Number of pooled sessions.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

async fn close_quietly<S: RemoteSession + ?Sized>(key: &str, session: &S) {
    if !session.is_alive() {
        debug!("Connection {} already closed, skipping", key);
        return;
    }
    match session.close().await {
        Ok(()) => debug!("SSH connection to {} closed", key),
        Err(e) => warn!("Error closing SSH connection to {}: {}", key, e),
    }
}
