//! Private key and certificate loading
//!
//! Keys and certificates are read from PEM files or in-memory PEM buffers into
//! owned OpenSSL handles. The handles free their native memory on drop, so
//! every exit path of a caller releases them, and the raw PEM bytes read from
//! disk are zeroized as soon as they have been parsed.

use crate::{Error, Result};
use log::debug;
use openssl::asn1::Asn1Time;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::x509::{X509Ref, X509};
use secrecy::zeroize::Zeroize;
use secrecy::{ExposeSecret, SecretString};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;

/// Private key used to sign, or to decrypt messages addressed to its certificate.
#[derive(Clone)]
pub struct PrivateKey {
    key: PKey<Private>,
}

impl PrivateKey {
    /// Parse an unencrypted PEM private key (PKCS#8 or traditional format).
    ///
    /// Encrypted keys fail with [`Error::InvalidKeyFormat`] instead of
    /// prompting for a passphrase; use [`PrivateKey::from_pem_with_passphrase`].
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        crate::init();

        let key = PKey::private_key_from_pem_callback(pem, |_buf| Ok(0))
            .map_err(|e| Error::InvalidKeyFormat(format!("Failed to load private key: {}", e)))?;

        Ok(Self::from_pkey(key))
    }

    /// Parse a passphrase-protected PEM private key.
    pub fn from_pem_with_passphrase(pem: &[u8], passphrase: &SecretString) -> Result<Self> {
        crate::init();

        let key = PKey::private_key_from_pem_passphrase(pem, passphrase.expose_secret().as_bytes())
            .map_err(|e| Error::InvalidKeyFormat(format!("Failed to load private key: {}", e)))?;

        Ok(Self::from_pkey(key))
    }

    /// Wrap an already loaded OpenSSL key.
    pub fn from_pkey(key: PKey<Private>) -> Self {
        Self { key }
    }

    /// Borrow the underlying OpenSSL key.
    pub fn as_pkey(&self) -> &PKeyRef<Private> {
        &self.key
    }

    /// Size of the key in bits.
    pub fn bits(&self) -> u32 {
        self.key.bits()
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("id", &self.key.id())
            .field("bits", &self.key.bits())
            .finish_non_exhaustive()
    }
}

/// Validity of a certificate relative to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    NotYetValid,
    Expired,
}

/// X.509 certificate identifying a signer or an encryption recipient.
#[derive(Clone)]
pub struct Certificate {
    cert: X509,
}

impl Certificate {
    /// Parse a PEM-encoded X.509 certificate.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        crate::init();

        let cert = X509::from_pem(pem).map_err(|e| {
            Error::InvalidCertificateFormat(format!("Failed to load certificate: {}", e))
        })?;

        Ok(Self::from_x509(cert))
    }

    /// Wrap an already loaded OpenSSL certificate.
    pub fn from_x509(cert: X509) -> Self {
        Self { cert }
    }

    /// Borrow the underlying OpenSSL certificate.
    pub fn as_x509(&self) -> &X509Ref {
        &self.cert
    }

    /// Subject name rendered as `CN=..., O=...` for log and error messages.
    pub fn subject(&self) -> String {
        let mut parts = Vec::new();

        for entry in self.cert.subject_name().entries() {
            let name = entry.object().nid().short_name().unwrap_or("?");
            let data = String::from_utf8_lossy(entry.data().as_slice());
            parts.push(format!("{}={}", name, data));
        }
        parts.join(", ")
    }

    /// Whether `key` is the private half of this certificate's public key.
    pub fn public_key_matches(&self, key: &PrivateKey) -> Result<bool> {
        let public_key = self.cert.public_key().map_err(|e| {
            Error::InvalidCertificateFormat(format!(
                "Failed to extract public key from certificate: {}",
                e
            ))
        })?;

        Ok(key.as_pkey().public_eq(&public_key))
    }

    /// Compare the certificate's validity window with the current time.
    pub fn validity(&self) -> Result<Validity> {
        let now = Asn1Time::days_from_now(0)
            .map_err(|e| Error::InvalidCertificateFormat(format!("Failed to read clock: {}", e)))?;

        let invalid_time = |e: ErrorStack| {
            Error::InvalidCertificateFormat(format!("Unreadable validity period: {}", e))
        };

        if self.cert.not_before().compare(&now).map_err(invalid_time)? == Ordering::Greater {
            return Ok(Validity::NotYetValid);
        }
        if self.cert.not_after().compare(&now).map_err(invalid_time)? == Ordering::Less {
            return Ok(Validity::Expired);
        }
        Ok(Validity::Valid)
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .finish()
    }
}

/// Load a private key from a PEM file.
///
/// A missing file fails with [`Error::NotFound`].
pub fn load_private_key(path: impl AsRef<Path>) -> Result<PrivateKey> {
    let path = path.as_ref();
    let mut pem = fs::read(path).map_err(|e| Error::from_io(e, path))?;

    let key = PrivateKey::from_pem(&pem);
    pem.zeroize();

    let key = key?;
    debug!(
        "Loaded {}-bit private key from {}",
        key.bits(),
        path.display()
    );
    Ok(key)
}

/// Load a passphrase-protected private key from a PEM file.
pub fn load_private_key_with_passphrase(
    path: impl AsRef<Path>,
    passphrase: &SecretString,
) -> Result<PrivateKey> {
    let path = path.as_ref();
    let mut pem = fs::read(path).map_err(|e| Error::from_io(e, path))?;

    let key = PrivateKey::from_pem_with_passphrase(&pem, passphrase);
    pem.zeroize();

    let key = key?;
    debug!(
        "Loaded encrypted {}-bit private key from {}",
        key.bits(),
        path.display()
    );
    Ok(key)
}

/// Load an X.509 certificate from a PEM file.
pub fn load_certificate(path: impl AsRef<Path>) -> Result<Certificate> {
    let path = path.as_ref();
    let pem = fs::read(path).map_err(|e| Error::from_io(e, path))?;

    let cert = Certificate::from_pem(&pem)?;
    debug!("Loaded certificate {} from {}", cert.subject(), path.display());
    Ok(cert)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ec_identity, rsa_identity, self_signed_cert};
    use openssl::symm::Cipher;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[test]
    fn test_from_pem_invalid_key() {
        let result = PrivateKey::from_pem(b"not a key");
        assert!(matches!(result, Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_from_pem_invalid_cert() {
        let result = Certificate::from_pem(b"not a cert");
        assert!(matches!(result, Err(Error::InvalidCertificateFormat(_))));
    }

    #[test]
    fn test_key_pem_is_not_a_certificate() {
        let (key, _) = rsa_identity();
        let pem = key.as_pkey().private_key_to_pem_pkcs8().unwrap();
        let result = Certificate::from_pem(&pem);
        assert!(matches!(result, Err(Error::InvalidCertificateFormat(_))));
    }

    #[test]
    fn test_der_key_is_rejected() {
        let (key, _) = rsa_identity();
        let der = key.as_pkey().private_key_to_der().unwrap();
        let result = PrivateKey::from_pem(&der);
        assert!(matches!(result, Err(Error::InvalidKeyFormat(_))));
    }

    #[test]
    fn test_load_pkcs8_and_traditional_rsa_keys() {
        let (key, _) = rsa_identity();

        let pkcs8 = key.as_pkey().private_key_to_pem_pkcs8().unwrap();
        assert_eq!(PrivateKey::from_pem(&pkcs8).unwrap().bits(), 2048);

        let traditional = key.as_pkey().rsa().unwrap().private_key_to_pem().unwrap();
        assert_eq!(PrivateKey::from_pem(&traditional).unwrap().bits(), 2048);
    }

    #[test]
    fn test_encrypted_key_requires_passphrase() {
        let (key, _) = rsa_identity();
        let pem = key
            .as_pkey()
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), b"hunter2")
            .unwrap();

        assert!(matches!(
            PrivateKey::from_pem(&pem),
            Err(Error::InvalidKeyFormat(_))
        ));

        let wrong = SecretString::new("wrong".to_string());
        assert!(matches!(
            PrivateKey::from_pem_with_passphrase(&pem, &wrong),
            Err(Error::InvalidKeyFormat(_))
        ));

        let right = SecretString::new("hunter2".to_string());
        let loaded = PrivateKey::from_pem_with_passphrase(&pem, &right).unwrap();
        assert!(loaded.as_pkey().public_eq(key.as_pkey()));
    }

    #[test]
    fn test_load_from_files() {
        let (key, cert) = rsa_identity();
        let key_file = write_temp(&key.as_pkey().private_key_to_pem_pkcs8().unwrap());
        let cert_file = write_temp(&cert.as_x509().to_pem().unwrap());

        let loaded_key = load_private_key(key_file.path()).unwrap();
        let loaded_cert = load_certificate(cert_file.path()).unwrap();

        assert!(loaded_cert.public_key_matches(&loaded_key).unwrap());
    }

    #[test]
    fn test_load_missing_files() {
        assert!(matches!(
            load_private_key("/nonexistent/merchant.key"),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            load_certificate("/nonexistent/merchant.crt"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_public_key_matches_mismatched() {
        let (_, cert) = rsa_identity();
        let (other_key, _) = rsa_identity();
        assert!(!cert.public_key_matches(&other_key).unwrap());
    }

    #[test]
    fn test_public_key_matches_ec() {
        let (key, cert) = ec_identity();
        assert!(cert.public_key_matches(&key).unwrap());
    }

    #[test]
    fn test_subject_rendering() {
        let (_, cert) = rsa_identity();
        assert_eq!(cert.subject(), "CN=Test Merchant");
    }

    #[test]
    fn test_subject_rendering_multiple_entries_and_utf8() {
        use openssl::hash::MessageDigest;
        use openssl::x509::{X509Builder, X509NameBuilder};

        let (key, _) = rsa_identity();
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", "Café Merchant").unwrap();
        name.append_entry_by_text("O", "Example Shop").unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key.as_pkey()).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        builder.sign(key.as_pkey(), MessageDigest::sha256()).unwrap();

        let cert = Certificate::from_x509(builder.build());
        assert_eq!(cert.subject(), "CN=Café Merchant, O=Example Shop");
    }

    #[test]
    fn test_validity() {
        let (key, cert) = rsa_identity();
        assert_eq!(cert.validity().unwrap(), Validity::Valid);

        let expired = self_signed_cert(
            &key,
            Asn1Time::from_unix(0).unwrap(),
            Asn1Time::from_unix(86_400).unwrap(),
        );
        assert_eq!(expired.validity().unwrap(), Validity::Expired);

        let future = self_signed_cert(
            &key,
            Asn1Time::days_from_now(30).unwrap(),
            Asn1Time::days_from_now(60).unwrap(),
        );
        assert_eq!(future.validity().unwrap(), Validity::NotYetValid);
    }

    #[test]
    fn test_debug_does_not_leak_key_material() {
        let (key, _) = rsa_identity();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("PrivateKey"));
        assert!(!rendered.contains("BEGIN"));
    }
}
