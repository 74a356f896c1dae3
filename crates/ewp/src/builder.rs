//! Ewp builder API
//!
//! Provides a builder pattern interface over the key/certificate files used
//! for Encrypted Website Payments, plus the two-call function API.
//! Keys and certificates are loaded per operation and dropped before it returns.

use crate::crypto::{
    load_certificate, load_private_key, load_private_key_with_passphrase, Certificate,
    ContentCipher, DigestAlgorithm, Encryptor, PrivateKey, Signer,
};
use crate::message::{EncryptedMessage, SignedMessage};
use crate::{Error, Result};
use log::info;
use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// Operation a builder configuration is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Needs the merchant key and certificate.
    Sign,
    /// Needs the recipient certificate.
    Encrypt,
    /// Needs the merchant key and certificate and the recipient certificate.
    Seal,
}

/// Encrypted Website Payments signer/encryptor with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use ewp::{ContentCipher, Ewp};
///
/// let sealed = Ewp::new()
///     .private_key("merchant.key")
///     .certificate("merchant.crt")
///     .recipient_certificate("paypal.crt")
///     .cipher(ContentCipher::Aes256Cbc)
///     .seal(b"cmd=_xclick\nbusiness=merchant@example.com")?;
/// # Ok::<(), ewp::Error>(())
/// ```
#[derive(Clone)]
pub struct Ewp {
    private_key: Option<PathBuf>,
    certificate: Option<PathBuf>,
    recipient_certificate: Option<PathBuf>,
    password: Option<SecretString>,
    digest: DigestAlgorithm,
    cipher: ContentCipher,
    detached: bool,
}

impl Ewp {
    /// Create a new Ewp builder.
    pub fn new() -> Self {
        Self {
            private_key: None,
            certificate: None,
            recipient_certificate: None,
            password: None,
            digest: DigestAlgorithm::default(),
            cipher: ContentCipher::default(),
            detached: true,
        }
    }

    /// Set the merchant's PEM private key path.
    pub fn private_key(mut self, path: impl AsRef<Path>) -> Self {
        self.private_key = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the merchant's PEM certificate path.
    pub fn certificate(mut self, path: impl AsRef<Path>) -> Self {
        self.certificate = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the PEM certificate messages are encrypted for (PayPal's public certificate).
    pub fn recipient_certificate(mut self, path: impl AsRef<Path>) -> Self {
        self.recipient_certificate = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the passphrase of an encrypted private key.
    ///
    /// The password is stored securely and will be zeroized when dropped.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Set the signature digest. Default is SHA-256.
    pub fn digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Set the content-encryption cipher. Default is AES-256-CBC.
    pub fn cipher(mut self, cipher: ContentCipher) -> Self {
        self.cipher = cipher;
        self
    }

    /// Produce detached (default) or content-embedding signatures from [`Ewp::sign`].
    ///
    /// [`Ewp::seal`] always embeds the content.
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// Validate the builder configuration for `operation`.
    ///
    /// Returns an error if:
    /// - Signing is requested without both private key and certificate
    /// - Encryption is requested without a recipient certificate
    /// - A password is set but no private key is
    pub fn validate(&self, operation: Operation) -> Result<()> {
        if self.password.is_some() && self.private_key.is_none() {
            return Err(Error::Config(
                "Password given without a private key".into(),
            ));
        }

        let needs_signer = matches!(operation, Operation::Sign | Operation::Seal);
        let needs_recipient = matches!(operation, Operation::Encrypt | Operation::Seal);

        if needs_signer && (self.private_key.is_none() || self.certificate.is_none()) {
            return Err(Error::MissingCredentials(
                "Both private key and certificate must be specified".into(),
            ));
        }

        if needs_recipient && self.recipient_certificate.is_none() {
            return Err(Error::MissingCredentials(
                "Recipient certificate must be specified".into(),
            ));
        }

        Ok(())
    }

    /// Load the merchant key and certificate from configured paths.
    fn load_signer(&self) -> Result<(PrivateKey, Certificate)> {
        let key_path = self
            .private_key
            .as_ref()
            .ok_or_else(|| Error::MissingCredentials("No private key configured".into()))?;
        let cert_path = self
            .certificate
            .as_ref()
            .ok_or_else(|| Error::MissingCredentials("No certificate configured".into()))?;

        let key = match self.password {
            Some(ref password) => load_private_key_with_passphrase(key_path, password)?,
            None => load_private_key(key_path)?,
        };
        let cert = load_certificate(cert_path)?;

        Ok((key, cert))
    }

    fn load_recipient(&self) -> Result<Certificate> {
        let path = self
            .recipient_certificate
            .as_ref()
            .ok_or_else(|| Error::MissingCredentials("No recipient certificate configured".into()))?;
        load_certificate(path)
    }

    /// Sign `plaintext` with the merchant key and certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key or certificate is not configured, missing, or not valid PEM
    /// - The key does not belong to the certificate
    /// - OpenSSL fails to build the signature
    pub fn sign(&self, plaintext: &[u8]) -> Result<SignedMessage> {
        self.validate(Operation::Sign)?;
        let (key, cert) = self.load_signer()?;

        Signer::new(&key, &cert)
            .digest(self.digest)
            .detached(self.detached)
            .sign(plaintext)
    }

    /// Encrypt `plaintext` for the recipient certificate.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedMessage> {
        self.validate(Operation::Encrypt)?;
        let recipient = self.load_recipient()?;

        Encryptor::new(&recipient)
            .cipher(self.cipher)
            .encrypt(plaintext)
    }

    /// Sign `plaintext` with the content embedded, then encrypt the signed
    /// structure for the recipient.
    ///
    /// This is the blob PayPal expects in an encrypted button's `encrypted`
    /// field (PEM encoded).
    pub fn seal(&self, plaintext: &[u8]) -> Result<EncryptedMessage> {
        self.validate(Operation::Seal)?;
        let (key, cert) = self.load_signer()?;
        let recipient = self.load_recipient()?;

        let signed = Signer::new(&key, &cert)
            .digest(self.digest)
            .detached(false)
            .sign(plaintext)?;

        let sealed = Encryptor::new(&recipient)
            .cipher(self.cipher)
            .encrypt(signed.as_der())?;

        info!(
            "Sealed {} bytes from {} for {}",
            plaintext.len(),
            cert.subject(),
            recipient.subject()
        );

        Ok(sealed)
    }
}

impl Default for Ewp {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign `plaintext` with the PEM key and certificate at the given paths.
///
/// Returns a DER PKCS#7 `signedData` with a detached SHA-256 signature.
/// A missing file fails with [`Error::NotFound`].
///
/// The output does not carry `plaintext`, so a verifier must be handed the
/// content separately (`openssl smime -verify -content <file>`). Running
/// `openssl smime -verify -inform DER -noverify` on the signature alone
/// fails. For a signature that embeds the content, build one with
/// [`Ewp::detached`]:
///
/// ```no_run
/// let signed = ewp::Ewp::new()
///     .private_key("merchant.key")
///     .certificate("merchant.crt")
///     .detached(false)
///     .sign(b"cmd=_xclick")?;
/// # Ok::<(), ewp::Error>(())
/// ```
pub fn sign(
    key_path: impl AsRef<Path>,
    cert_path: impl AsRef<Path>,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    Ewp::new()
        .private_key(key_path)
        .certificate(cert_path)
        .sign(plaintext)
        .map(SignedMessage::into_der)
}

/// Encrypt `plaintext` for the PEM certificate at `cert_path`.
///
/// Returns a DER PKCS#7 `envelopedData`.
pub fn encrypt(
    cert_path: impl AsRef<Path>,
    plaintext: &[u8],
    cipher: ContentCipher,
) -> Result<Vec<u8>> {
    Ewp::new()
        .recipient_certificate(cert_path)
        .cipher(cipher)
        .encrypt(plaintext)
        .map(EncryptedMessage::into_der)
}
