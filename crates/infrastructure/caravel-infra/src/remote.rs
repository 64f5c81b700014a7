use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

/// Chunked file content coming off the remote data connection. Every item is
/// one read; a mid-stream fault surfaces as an `Err` item.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, RemoteError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// A list or delete command failed. Fatal for list (no inventory can be
    /// built without it), logged-and-continued for delete.
    #[error("remote command fault: {0}")]
    Command(String),
    /// A download could not be opened or broke mid-stream.
    #[error("transfer fault: {0}")]
    Transfer(String),
}

/// The remote-transfer protocol client, abstracted so the sync pipeline
/// never touches protocol details directly.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Raw multi-line response of the directory-listing command.
    async fn list(&self) -> Result<String, RemoteError>;

    /// Open a read stream for one remote file.
    async fn retrieve(&self, name: &str) -> Result<ByteStream, RemoteError>;

    /// Delete one remote file, returning the server's status text.
    async fn delete(&self, name: &str) -> Result<String, RemoteError>;
}
