//! error types for capbox

use thiserror::Error;

use crate::capability::Level;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// operation needs a signing key this capability does not hold
    #[error("don't have write capability")]
    NoWriteCapability,

    /// operation needs the container secret this capability does not hold
    #[error("don't have read capability")]
    NoReadCapability,

    #[error("cannot degrade to a {0} capability")]
    CannotDegrade(Level),

    #[error("potentially forged data: signature mismatch")]
    SignatureMismatch,

    #[error("encryption failed")]
    EncryptionFailed,

    /// aead tag mismatch or truncated ciphertext, distinct from a
    /// signature failure: a correctly signed body still fails here
    /// when opened with the wrong container secret
    #[error("decryption failed: tag mismatch or truncated ciphertext")]
    DecryptionFailed,

    #[error("key derivation failed")]
    KdfFailed,

    #[error("invalid capability token: {0}")]
    InvalidToken(String),

    #[error("truncated or malformed encrypted message")]
    MalformedMessage,

    #[error("name too long: {0} bytes")]
    NameTooLong(usize),

    #[error("value too long: {0} bytes")]
    ValueTooLong(usize),
}
