//! SSH client implementation using russh.
//!
//! Builds the transport for a compose servo: agent authentication, host-key
//! verification against known_hosts, an optional bastion hop, and a watcher
//! that tears the connection down when the caller's token is cancelled.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, Disconnect};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ServoError};
use crate::servo::Servo;
use crate::ssh::config::{AuthMethod, SshConfig};
use crate::ssh::known_hosts::KnownHosts;

/// One SSH endpoint with the user to log in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hop {
    pub user: String,
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// How the target of a compose servo is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Direct { target: Hop },
    /// The target is dialed from inside the bastion's connection, never
    /// from this machine.
    ViaBastion { bastion: Hop, target: Hop },
}

impl Route {
    pub fn for_servo(servo: &Servo) -> Result<Self> {
        let target = Hop {
            user: servo.user.clone(),
            host: servo.host.clone(),
            port: servo.port,
        };

        Ok(match servo.bastion()? {
            Some(b) => Route::ViaBastion {
                bastion: Hop {
                    user: b.user,
                    host: b.host,
                    port: b.port,
                },
                target,
            },
            None => Route::Direct { target },
        })
    }

    /// Hops in the order they are dialed.
    pub fn hops(&self) -> Vec<&Hop> {
        match self {
            Route::Direct { target } => vec![target],
            Route::ViaBastion { bastion, target } => vec![bastion, target],
        }
    }

    pub fn target(&self) -> &Hop {
        match self {
            Route::Direct { target } | Route::ViaBastion { target, .. } => target,
        }
    }
}

/// An authenticated connection to one hop.
pub struct SshClient {
    handle: Arc<Handle<ClientHandler>>,
    hop: Hop,
}

impl SshClient {
    /// Dial `hop` over a direct TCP connection.
    pub async fn connect(hop: &Hop, config: &SshConfig, known_hosts: Arc<KnownHosts>) -> Result<Self> {
        tracing::debug!("dialing {}", hop);

        let handler = ClientHandler::new(hop, known_hosts);
        let mut handle = client::connect(
            Arc::new(config.russh_config()),
            (hop.host.as_str(), hop.port),
            handler,
        )
        .await?;

        Self::authenticate(&mut handle, hop, config.auth).await?;

        Ok(Self {
            handle: Arc::new(handle),
            hop: hop.clone(),
        })
    }

    /// Dial `hop` through a `direct-tcpip` channel of an established client,
    /// running the SSH handshake over that tunnel.
    pub async fn connect_via(
        jump: &SshClient,
        hop: &Hop,
        config: &SshConfig,
        known_hosts: Arc<KnownHosts>,
    ) -> Result<Self> {
        tracing::debug!("dialing {} through {}", hop, jump.hop);

        let channel = jump
            .handle
            .channel_open_direct_tcpip(hop.host.as_str(), hop.port as u32, "127.0.0.1", 0)
            .await
            .map_err(|e| {
                ServoError::Ssh(format!("tunnel to {} via {}: {}", hop, jump.hop, e))
            })?;

        let handler = ClientHandler::new(hop, known_hosts);
        let mut handle = client::connect_stream(
            Arc::new(config.russh_config()),
            channel.into_stream(),
            handler,
        )
        .await?;

        Self::authenticate(&mut handle, hop, config.auth).await?;

        Ok(Self {
            handle: Arc::new(handle),
            hop: hop.clone(),
        })
    }

    /// Authenticate to `hop` with the configured method.
    async fn authenticate(handle: &mut Handle<ClientHandler>, hop: &Hop, method: AuthMethod) -> Result<()> {
        let accepted = match method {
            AuthMethod::Agent => Self::auth_with_agent(handle, &hop.user).await,
            #[cfg(test)]
            AuthMethod::Anonymous => handle
                .authenticate_none(hop.user.as_str())
                .await
                .map_err(ServoError::from),
        };

        match accepted {
            Ok(true) => {
                tracing::debug!("authenticated to {} with {:?}", hop, method);
                Ok(())
            }
            Ok(false) => Err(ServoError::Ssh(format!(
                "unable to authenticate to {}: no agent key was accepted",
                hop
            ))),
            Err(e) => Err(ServoError::Ssh(format!(
                "unable to authenticate to {}: {}",
                hop, e
            ))),
        }
    }

    #[cfg(not(unix))]
    async fn auth_with_agent(_handle: &mut Handle<ClientHandler>, _user: &str) -> Result<bool> {
        Err(ServoError::Ssh(
            "ssh-agent authentication needs a unix socket".to_string(),
        ))
    }

    #[cfg(unix)]
    async fn auth_with_agent(handle: &mut Handle<ClientHandler>, user: &str) -> Result<bool> {
        use tokio::net::UnixStream;

        if !crate::ssh::is_ssh_agent_running() {
            return Err(ServoError::Ssh("SSH_AUTH_SOCK not set or not reachable".to_string()));
        }

        let socket_path = std::env::var("SSH_AUTH_SOCK")
            .map_err(|_| ServoError::Ssh("SSH_AUTH_SOCK not set".to_string()))?;

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| ServoError::Ssh(format!("Failed to connect to agent: {}", e)))?;

        let mut agent = russh_keys::agent::client::AgentClient::connect(stream);

        let identities = agent
            .request_identities()
            .await
            .map_err(|e| ServoError::Ssh(format!("Failed to get agent identities: {}", e)))?;

        tracing::debug!("Agent has {} identities", identities.len());

        for identity in identities {
            tracing::trace!(
                "Trying agent key: comment='{}', algo='{}'",
                identity.comment(),
                identity.algorithm()
            );

            match handle
                .authenticate_publickey_with(user, identity, &mut agent)
                .await
            {
                Ok(true) => return Ok(true),
                Ok(false) => continue,
                Err(e) => {
                    tracing::debug!("Agent auth error: {}", e);
                    continue;
                }
            }
        }

        Ok(false)
    }

    pub async fn disconnect(&self) {
        if self.handle.is_closed() {
            return;
        }
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            tracing::debug!("disconnect from {}: {}", self.hop, e);
        }
    }
}

/// One established transport bound to a single servo operation.
///
/// Owns the target client, the bastion client it rides on (if any), the open
/// session channel, and the cancellation watcher. Dropping it aborts the
/// watcher; [`close`](Self::close) also disconnects both clients.
pub struct RemoteSession {
    pub(crate) channel: Channel<Msg>,
    pub(crate) cancel: CancellationToken,
    client: SshClient,
    bastion: Option<SshClient>,
    watcher: JoinHandle<()>,
}

impl RemoteSession {
    pub async fn close(self) {
        let _ = self.channel.close().await;
        self.client.disconnect().await;
        if let Some(bastion) = &self.bastion {
            bastion.disconnect().await;
        }
    }

    /// Close the session, then hand back `result` unchanged.
    pub(crate) async fn finish<T>(self, result: Result<T>) -> Result<T> {
        self.close().await;
        result
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

/// Connect to a compose servo and open a session channel on it.
///
/// Cancelling `cancel` at any point closes the transport: during setup the
/// pending dial is dropped, afterwards the watcher disconnects the clients
/// out from under whatever call is blocked on them.
pub async fn connect(servo: &Servo, config: &SshConfig, cancel: CancellationToken) -> Result<RemoteSession> {
    let known_hosts = Arc::new(KnownHosts::load(&config.known_hosts)?);
    let route = Route::for_servo(servo)?;

    tracing::debug!(
        "connecting to servo {} at {} via {} hop(s), {} known hosts",
        servo.name,
        route.target(),
        route.hops().len(),
        known_hosts.entries()
    );

    tokio::select! {
        session = establish(&route, config, known_hosts, cancel.clone()) => session,
        _ = cancel.cancelled() => Err(ServoError::Cancelled),
    }
}

async fn establish(
    route: &Route,
    config: &SshConfig,
    known_hosts: Arc<KnownHosts>,
    cancel: CancellationToken,
) -> Result<RemoteSession> {
    let (client, bastion) = match route {
        Route::Direct { target } => (SshClient::connect(target, config, known_hosts).await?, None),
        Route::ViaBastion { bastion, target } => {
            let jump = SshClient::connect(bastion, config, known_hosts.clone()).await?;
            match SshClient::connect_via(&jump, target, config, known_hosts).await {
                Ok(client) => (client, Some(jump)),
                Err(e) => {
                    jump.disconnect().await;
                    return Err(e);
                }
            }
        }
    };

    let channel = match client.handle.channel_open_session().await {
        Ok(channel) => channel,
        Err(e) => {
            client.disconnect().await;
            if let Some(jump) = &bastion {
                jump.disconnect().await;
            }
            return Err(e.into());
        }
    };

    let watcher = spawn_watcher(
        cancel.clone(),
        client.handle.clone(),
        bastion.as_ref().map(|b| b.handle.clone()),
    );

    Ok(RemoteSession {
        channel,
        cancel,
        client,
        bastion,
        watcher,
    })
}

fn spawn_watcher(
    cancel: CancellationToken,
    client: Arc<Handle<ClientHandler>>,
    bastion: Option<Arc<Handle<ClientHandler>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        tracing::debug!("cancelled, closing SSH connection");
        let _ = client
            .disconnect(Disconnect::ByApplication, "cancelled", "en")
            .await;
        if let Some(bastion) = bastion {
            let _ = bastion
                .disconnect(Disconnect::ByApplication, "cancelled", "en")
                .await;
        }
    })
}

/// Client handler for russh connection callbacks.
pub struct ClientHandler {
    host: String,
    port: u16,
    known_hosts: Arc<KnownHosts>,
}

impl ClientHandler {
    fn new(hop: &Hop, known_hosts: Arc<KnownHosts>) -> Self {
        Self {
            host: hop.host.clone(),
            port: hop.port,
            known_hosts,
        }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = ServoError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        self.known_hosts
            .verify(&self.host, self.port, server_public_key)
    }
}
