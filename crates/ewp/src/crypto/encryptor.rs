//! PKCS#7 `envelopedData` generation
//!
//! OpenSSL generates a fresh content-encryption key for every message, encrypts
//! the payload under it, and wraps the key with the recipient certificate's RSA
//! public key. The content key never leaves the library.

use super::algorithms::ContentCipher;
use super::assets::{Certificate, Validity};
use crate::message::EncryptedMessage;
use crate::{Error, Result};
use log::{debug, warn};
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::X509;

/// Builder for a single encryption operation.
#[derive(Debug, Clone)]
pub struct Encryptor<'a> {
    recipient: &'a Certificate,
    cipher: ContentCipher,
}

impl<'a> Encryptor<'a> {
    /// Create an encryptor for `recipient` using AES-256-CBC.
    pub fn new(recipient: &'a Certificate) -> Self {
        Self {
            recipient,
            cipher: ContentCipher::default(),
        }
    }

    /// Set the content-encryption cipher.
    ///
    /// See [`ContentCipher`] for the caveats of the legacy ciphers.
    pub fn cipher(mut self, cipher: ContentCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Encrypt `plaintext` for the recipient and return the DER-encoded `envelopedData`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncryptionFailed`] if:
    /// - The recipient certificate is expired or not yet valid
    /// - The recipient key type cannot receive PKCS#7 key transport (e.g. EC)
    /// - The selected cipher is unavailable in the linked OpenSSL
    /// - OpenSSL reports any other error
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedMessage> {
        crate::init();

        let validity = self
            .recipient
            .validity()
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?;
        match validity {
            Validity::Valid => {}
            Validity::Expired => {
                return Err(Error::EncryptionFailed(format!(
                    "Recipient certificate {} has expired",
                    self.recipient.subject()
                )))
            }
            Validity::NotYetValid => {
                return Err(Error::EncryptionFailed(format!(
                    "Recipient certificate {} is not yet valid",
                    self.recipient.subject()
                )))
            }
        }

        if self.cipher.is_legacy() {
            warn!(
                "Encrypting with legacy cipher {}; select AES when the recipient supports it",
                self.cipher
            );
        }

        self.cipher.ensure_available()?;

        let mut recipients: Stack<X509> = Stack::new()
            .map_err(|e| Error::EncryptionFailed(format!("Failed to create recipient stack: {}", e)))?;
        recipients
            .push(self.recipient.as_x509().to_owned())
            .map_err(|e| Error::EncryptionFailed(format!("Failed to add recipient: {}", e)))?;

        let p7 = Pkcs7::encrypt(&recipients, plaintext, self.cipher.cipher(), Pkcs7Flags::BINARY)
            .map_err(|e| Error::EncryptionFailed(format!("Failed to encrypt data: {}", e)))?;

        let der = p7
            .to_der()
            .map_err(|e| Error::EncryptionFailed(format!("Failed to encode PKCS#7 envelope: {}", e)))?;

        debug!(
            "Encrypted {} bytes for {} ({}): {} byte envelopedData",
            plaintext.len(),
            self.recipient.subject(),
            self.cipher,
            der.len()
        );

        Ok(EncryptedMessage::new(der))
    }
}

/// Encrypt `plaintext` for `recipient` with an explicitly chosen cipher.
pub fn encrypt(
    recipient: &Certificate,
    plaintext: &[u8],
    cipher: ContentCipher,
) -> Result<EncryptedMessage> {
    Encryptor::new(recipient).cipher(cipher).encrypt(plaintext)
}
