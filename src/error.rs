use std::io;

use thiserror::Error;

/// Result type used across this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or thread-spawn failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A datagram or payload violated the wire format.
    #[error("protocol error: {0}")]
    Protocol(&'static str),

    /// A RAKP code or packet integrity code failed verification.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// Cryptographic failure (bad key size, non-block-aligned ciphertext).
    #[error("crypto error: {0}")]
    Crypto(&'static str),

    /// Unsupported algorithm or protocol feature.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// The manager has been shut down.
    #[error("manager is shut down")]
    Shutdown,
}
