// src/tunnel.rs
use crate::config::{SshConfig, DEFAULT_LOCAL_PORT, DEFAULT_SSH_PORT};
use crate::error::{Result, WriterError};
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tracing::{debug, info};

pub const LOCAL_HOST: &str = "127.0.0.1";

const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_DELAY: Duration = Duration::from_millis(200);

/// Resolved parameters of one local port forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelParams {
    pub user: String,
    pub ssh_host: String,
    pub ssh_port: u16,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

impl TunnelParams {
    /// Missing remote endpoint defaults to the configured destination.
    pub fn resolve(ssh: &SshConfig, remote_host: &str, remote_port: u16) -> Self {
        Self {
            user: ssh.user.clone(),
            ssh_host: ssh.ssh_host.clone(),
            ssh_port: ssh.ssh_port.unwrap_or(DEFAULT_SSH_PORT),
            local_port: ssh.local_port.unwrap_or(DEFAULT_LOCAL_PORT),
            remote_host: ssh
                .remote_host
                .clone()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| remote_host.to_string()),
            remote_port: ssh.remote_port.unwrap_or(remote_port),
        }
    }

    fn ssh_args(&self, key_path: &str) -> Vec<String> {
        vec![
            "-N".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-i".to_string(),
            key_path.to_string(),
            "-p".to_string(),
            self.ssh_port.to_string(),
            "-L".to_string(),
            format!("{}:{}:{}:{}", LOCAL_HOST, self.local_port, self.remote_host, self.remote_port),
            format!("{}@{}", self.user, self.ssh_host),
        ]
    }
}

/// An open `ssh -L` forward. Dropping it stops the process and removes the key file.
#[derive(Debug)]
pub struct SshTunnel {
    child: Child,
    local_port: u16,
    _key_file: NamedTempFile,
}

impl SshTunnel {
    pub async fn open(params: &TunnelParams, private_key: &str) -> Result<Self> {
        info!("Creating SSH tunnel to '{}'", params.ssh_host);

        // NamedTempFile is created with 0600 permissions
        let mut key_file = NamedTempFile::new()?;
        key_file.write_all(private_key.as_bytes())?;
        if !private_key.ends_with('\n') {
            key_file.write_all(b"\n")?;
        }
        key_file.flush()?;
        let key_path = key_file.path().to_string_lossy().to_string();

        let child = Command::new("ssh")
            .args(params.ssh_args(&key_path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WriterError::Tunnel(format!("Cannot start ssh: {}", e)))?;

        let mut tunnel = Self {
            child,
            local_port: params.local_port,
            _key_file: key_file,
        };
        tunnel.wait_ready(params).await?;
        debug!(local_port = params.local_port, "ssh tunnel ready");
        Ok(tunnel)
    }

    async fn wait_ready(&mut self, params: &TunnelParams) -> Result<()> {
        for _ in 0..CONNECT_ATTEMPTS {
            if let Some(status) = self.child.try_wait()? {
                return Err(WriterError::Tunnel(format!(
                    "Unable to open SSH tunnel to '{}': ssh exited with {}",
                    params.ssh_host, status
                )));
            }
            if TcpStream::connect((LOCAL_HOST, self.local_port)).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(CONNECT_DELAY).await;
        }
        Err(WriterError::Tunnel(format!(
            "Unable to open SSH tunnel to '{}': local port {} did not become ready",
            params.ssh_host, self.local_port
        )))
    }

    /// The `(host, port)` the destination client should use instead.
    pub fn local_endpoint(&self) -> (&'static str, u16) {
        (LOCAL_HOST, self.local_port)
    }
}
