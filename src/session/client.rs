use super::*;

/// SSH transport for RouterOS devices.
#[derive(Debug, Clone)]
pub struct SshConnector {
    security_options: ConnectionSecurityOptions,
    connect_timeout: Duration,
    inactivity_timeout: Duration,
}

impl SshConnector {
    pub fn new(config: &ManagerConfig, security_options: ConnectionSecurityOptions) -> Self {
        Self {
            security_options,
            connect_timeout: config.connect_timeout,
            inactivity_timeout: config.time_to_idle,
        }
    }

    pub fn security_options(&self) -> &ConnectionSecurityOptions {
        &self.security_options
    }
}

/// One authenticated SSH session. Each command runs on its own exec channel.
pub struct SshSession {
    client: Client,
    device_addr: String,
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self, target: &Target) -> Result<SshSession, ConnectError> {
        let device_addr = target.key();

        let config = Config {
            preferred: self.security_options.preferred(),
            inactivity_timeout: Some(self.inactivity_timeout),
            ..Default::default()
        };

        let connecting = Client::connect_with_config(
            (target.host.clone(), target.port()),
            &target.username,
            AuthMethod::with_password(&target.password),
            self.security_options.server_check.clone(),
            config,
        );

        let client = match tokio::time::timeout(self.connect_timeout, connecting).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => return Err(ConnectError::from_transport(&device_addr, &err)),
            Err(_) => {
                return Err(ConnectError::connect_timeout(
                    &device_addr,
                    self.connect_timeout,
                ));
            }
        };
        debug!("{} SSH session established", device_addr);

        Ok(SshSession {
            client,
            device_addr,
        })
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ConnectError> {
        let result = self
            .client
            .execute(command)
            .await
            .map_err(|e| ConnectError::Execution {
                command: command.to_string(),
                cause: e.to_string(),
            })?;
        debug!(
            "{} command exited with status {}",
            self.device_addr, result.exit_status
        );

        Ok(ExecOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_status: result.exit_status,
        })
    }

    fn is_alive(&self) -> bool {
        !self.client.is_closed()
    }

    async fn close(&self) -> Result<(), ConnectError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| ConnectError::Connect {
                target: self.device_addr.clone(),
                kind: crate::error::FailureKind::Other,
                cause: e.to_string(),
            })
    }
}
