//! Error types for ewp operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure case
//! of loading keys and certificates, signing, encrypting, and the
//! receiving-side checks.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for ewp operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
/// Every error is final for the operation that raised it: nothing is retried and
/// no partial output is returned.
///
/// # Examples
///
/// ```no_run
/// use ewp::Error;
///
/// match ewp::sign("merchant.key", "merchant.crt", b"cmd=_xclick") {
///     Ok(der) => println!("{} bytes", der.len()),
///     Err(Error::NotFound { path }) => eprintln!("missing: {}", path.display()),
///     Err(Error::SigningFailed(msg)) => eprintln!("signing failed: {msg}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// A key or certificate file does not exist.
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// I/O operation failed for a reason other than a missing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The private key is not valid PEM, is corrupt, or the passphrase is wrong.
    #[error("Invalid private key: {0}")]
    InvalidKeyFormat(String),

    /// The certificate is not a valid PEM-encoded X.509 certificate.
    #[error("Invalid certificate: {0}")]
    InvalidCertificateFormat(String),

    /// Building the PKCS#7 `signedData` structure failed.
    ///
    /// Raised when the key and certificate do not form a key pair, or when
    /// the underlying library reports an error.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Building the PKCS#7 `envelopedData` structure failed.
    ///
    /// Raised for expired or not-yet-valid certificates, recipient key types
    /// PKCS#7 cannot encrypt to, unavailable ciphers, and library errors.
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// A signed message did not verify against the given certificate.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// An enveloped message could not be decrypted with the given key.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Input bytes are not a PKCS#7 structure of the expected type.
    #[error("Invalid PKCS#7 message: {0}")]
    InvalidMessage(String),

    /// Required key or certificate paths were not configured on [`crate::Ewp`].
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Invalid builder configuration or unknown algorithm name.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Maps an I/O error on `path` to [`Error::NotFound`] or [`Error::Io`].
    pub(crate) fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path: path.into() }
        } else {
            Error::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_from_io_not_found() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::NotFound), "/nonexistent");
        match err {
            Error::NotFound { path } => assert_eq!(path, PathBuf::from("/nonexistent")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_from_io_other_kind() {
        let err = Error::from_io(io::Error::from(io::ErrorKind::PermissionDenied), "/root/key.pem");
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_not_found_display_includes_path() {
        let err = Error::NotFound {
            path: PathBuf::from("/etc/ewp/merchant.key"),
        };
        assert_eq!(err.to_string(), "File not found: /etc/ewp/merchant.key");
    }
}
