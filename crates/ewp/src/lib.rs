//! PKCS#7 signing and encryption for PayPal Encrypted Website Payments.
//!
//! A merchant signs button form data with its own key and certificate, then
//! encrypts the signed blob for PayPal's public certificate. Both steps produce
//! standard PKCS#7 structures that OpenSSL-compatible receivers consume.
//!
//! ```no_run
//! use ewp::{ContentCipher, Ewp, OutputFormat};
//!
//! let signature = ewp::sign("merchant.key", "merchant.crt", b"cmd=_xclick")?;
//! let envelope = ewp::encrypt("paypal.crt", b"cmd=_xclick", ContentCipher::Aes256Cbc)?;
//!
//! let sealed = Ewp::new()
//!     .private_key("merchant.key")
//!     .certificate("merchant.crt")
//!     .recipient_certificate("paypal.crt")
//!     .seal(b"cmd=_xclick\nbusiness=merchant@example.com")?;
//! let form_field = sealed.encode(OutputFormat::Pem)?;
//! # Ok::<(), ewp::Error>(())
//! ```

pub mod builder;
pub mod crypto;
pub mod error;
pub mod message;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder::{encrypt, sign, Ewp};
pub use crypto::{Certificate, ContentCipher, DigestAlgorithm, PrivateKey};
pub use error::Error;
pub use message::{EncryptedMessage, OutputFormat, SignedMessage};

pub type Result<T> = std::result::Result<T, Error>;

/// Initialize the OpenSSL library.
///
/// Idempotent and thread-safe; every operation in this crate calls it, so an
/// explicit call is only needed to control when the one-time setup happens.
/// There is no matching teardown.
pub fn init() {
    openssl::init();
}
