pub mod ftp;
pub mod remote;
pub mod transfer;

// Re-exports for convenience
pub use ftp::{FtpCredentials, FtpEndpoint, FtpStore};
pub use remote::{ByteStream, RemoteError, RemoteStore};
pub use transfer::{Dispatcher, TransferError, TransferEvent, TransferItem, TransferStats};
