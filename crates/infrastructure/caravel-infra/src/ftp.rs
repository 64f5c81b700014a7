use std::io::Read;

use bytes::Bytes;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::remote::{ByteStream, RemoteError, RemoteStore};

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Bytes read from the data connection per chunk.
pub const TRANSFER_CHUNK_SIZE: usize = 4096;

/// Backpressure depth of the blocking-reader -> async bridge, in chunks.
const CHUNK_CHANNEL_DEPTH: usize = 8;

/// Address of one FTP endpoint plus the server directory that holds the
/// mirrored collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpEndpoint {
    pub host: String,
    pub port: u16,
    pub base_dir: Option<String>,
}

impl FtpEndpoint {
    /// Parse `[ftp://]HOST[:PORT][/BASE_DIR]`.
    pub fn parse(input: &str) -> Result<Self, RemoteError> {
        let rest = input.strip_prefix("ftp://").unwrap_or(input);
        let rest = rest.trim_end_matches('/');
        let (addr, base_dir) = match rest.split_once('/') {
            Some((addr, dir)) if !dir.is_empty() => (addr, Some(dir.to_string())),
            Some((addr, _)) => (addr, None),
            None => (rest, None),
        };
        let (host, port) = match addr.split_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .map_err(|_| RemoteError::Command(format!("invalid port in host {input}")))?,
            ),
            None => (addr, DEFAULT_FTP_PORT),
        };
        if host.is_empty() {
            return Err(RemoteError::Command(format!("invalid host {input}")));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            base_dir,
        })
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct FtpCredentials {
    pub user: String,
    pub password: String,
}

impl Default for FtpCredentials {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            password: "anonymous@".to_string(),
        }
    }
}

/// FTP-backed [`RemoteStore`]. Opens a fresh control connection per
/// operation so concurrent transfers never share protocol state; the
/// blocking protocol driver runs on the blocking pool and hands chunks to
/// the async side through a bounded channel.
#[derive(Clone)]
pub struct FtpStore {
    endpoint: FtpEndpoint,
    credentials: FtpCredentials,
}

impl FtpStore {
    pub fn new(endpoint: FtpEndpoint, credentials: FtpCredentials) -> Self {
        Self {
            endpoint,
            credentials,
        }
    }

    fn connect(&self) -> Result<FtpStream, FtpError> {
        let mut ftp = FtpStream::connect(self.endpoint.addr())?;
        ftp.login(
            self.credentials.user.as_str(),
            self.credentials.password.as_str(),
        )?;
        if let Some(dir) = &self.endpoint.base_dir {
            ftp.cwd(dir)?;
        }
        Ok(ftp)
    }

    /// Blocking driver for one retrieval: reads fixed-size chunks off the
    /// data connection and forwards them until end-of-stream, or stops
    /// silently once the receiver has gone away.
    fn stream_blocking(
        &self,
        name: &str,
        tx: &mpsc::Sender<Result<Bytes, RemoteError>>,
    ) -> Result<(), RemoteError> {
        let mut ftp = self
            .connect()
            .map_err(|e| RemoteError::Transfer(format!("connect for {name} failed: {e}")))?;
        ftp.transfer_type(FileType::Binary)
            .map_err(|e| RemoteError::Transfer(format!("binary mode for {name} failed: {e}")))?;
        let mut data = ftp
            .retr_as_stream(name)
            .map_err(|e| RemoteError::Transfer(format!("retrieve of {name} failed: {e}")))?;

        let mut buf = [0u8; TRANSFER_CHUNK_SIZE];
        loop {
            let n = data
                .read(&mut buf)
                .map_err(|e| RemoteError::Transfer(format!("read from {name} failed: {e}")))?;
            if n == 0 {
                break;
            }
            if tx
                .blocking_send(Ok(Bytes::copy_from_slice(&buf[..n])))
                .is_err()
            {
                debug!("receiver for {name} dropped, abandoning stream");
                return Ok(());
            }
        }

        ftp.finalize_retr_stream(data)
            .map_err(|e| RemoteError::Transfer(format!("finalize of {name} failed: {e}")))?;
        let _ = ftp.quit();
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for FtpStore {
    async fn list(&self) -> Result<String, RemoteError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut ftp = store
                .connect()
                .map_err(|e| RemoteError::Command(format!("connect for listing failed: {e}")))?;
            let lines = ftp
                .list(None)
                .map_err(|e| RemoteError::Command(format!("list command failed: {e}")))?;
            let _ = ftp.quit();
            info!("directory listing complete, {} lines", lines.len());
            Ok(lines.join("\r\n"))
        })
        .await
        .map_err(|e| RemoteError::Command(format!("listing task failed: {e}")))?
    }

    async fn retrieve(&self, name: &str) -> Result<ByteStream, RemoteError> {
        let store = self.clone();
        let name = name.to_string();
        let (tx, rx) = mpsc::channel::<Result<Bytes, RemoteError>>(CHUNK_CHANNEL_DEPTH);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.stream_blocking(&name, &tx) {
                let _ = tx.blocking_send(Err(e));
            }
        });

        Ok(Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    async fn delete(&self, name: &str) -> Result<String, RemoteError> {
        let store = self.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let mut ftp = store
                .connect()
                .map_err(|e| RemoteError::Command(format!("connect for delete failed: {e}")))?;
            ftp.rm(&name)
                .map_err(|e| RemoteError::Command(format!("delete of {name} failed: {e}")))?;
            let _ = ftp.quit();
            // suppaftp consumes the server's 250 reply internally; report a
            // stable status line of our own.
            Ok(format!("250 {name} deleted"))
        })
        .await
        .map_err(|e| RemoteError::Command(format!("delete task failed: {e}")))?
    }
}
