//! Error taxonomy for the adapter.

/// Errors surfaced by client and channel operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Socket connect, read or write failure. Never retried.
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("TLS setup failed: {0}")]
    Tls(String),
    /// The server rejected our credentials. Carries the line that said so.
    #[error("Twitch login failed, check your credentials: {0}")]
    AuthFailed(String),
    #[error("timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },
    #[error("not connected")]
    NotConnected,
    /// The server closed the socket before the login window ended.
    #[error("connection closed by server")]
    ConnectionClosed,
    /// A channel handle outlived the client that created it.
    #[error("client has been dropped")]
    ClientDropped,
}

pub type Result<T> = std::result::Result<T, Error>;
