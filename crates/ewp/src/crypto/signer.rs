//! PKCS#7 `signedData` generation
//!
//! Signs form data with the merchant's key and embeds the merchant's
//! certificate as the signer identity. Signatures are detached by default:
//! the receiving side supplies the content when verifying.

use super::algorithms::DigestAlgorithm;
use super::assets::{Certificate, PrivateKey};
use super::pkcs7_ffi::{self, MemBioSlice};
use crate::message::SignedMessage;
use crate::{Error, Result};
use foreign_types::{ForeignType, ForeignTypeRef};
use log::debug;
use openssl::error::ErrorStack;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use std::ptr;

/// Builder for a single signing operation.
///
/// # Example
///
/// ```no_run
/// use ewp::crypto::{load_certificate, load_private_key, DigestAlgorithm, Signer};
///
/// let key = load_private_key("merchant.key")?;
/// let cert = load_certificate("merchant.crt")?;
///
/// let signed = Signer::new(&key, &cert)
///     .digest(DigestAlgorithm::Sha512)
///     .sign(b"cmd=_xclick\nbusiness=merchant@example.com")?;
/// std::fs::write("button.p7s", signed.as_der())?;
/// # Ok::<(), ewp::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Signer<'a> {
    key: &'a PrivateKey,
    cert: &'a Certificate,
    digest: DigestAlgorithm,
    detached: bool,
}

impl<'a> Signer<'a> {
    /// Create a signer with SHA-256 and detached content.
    pub fn new(key: &'a PrivateKey, cert: &'a Certificate) -> Self {
        Self {
            key,
            cert,
            digest: DigestAlgorithm::default(),
            detached: true,
        }
    }

    /// Set the message digest algorithm.
    pub fn digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Choose between a detached signature (default) and one embedding the content.
    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    /// Sign `plaintext` and return the DER-encoded `signedData`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SigningFailed`] if:
    /// - The private key does not belong to the certificate
    /// - OpenSSL fails to build or finalize the structure
    pub fn sign(&self, plaintext: &[u8]) -> Result<SignedMessage> {
        crate::init();

        let matches = self
            .cert
            .public_key_matches(self.key)
            .map_err(|e| Error::SigningFailed(e.to_string()))?;
        if !matches {
            return Err(Error::SigningFailed(
                "Private key does not match certificate public key".into(),
            ));
        }

        let mut flags = Pkcs7Flags::BINARY;
        if self.detached {
            flags |= Pkcs7Flags::DETACHED;
        }

        let p7 = build_signed_data(self.key, self.cert, self.digest, plaintext, flags)
            .map_err(|e| Error::SigningFailed(format!("Failed to build PKCS#7 signature: {}", e)))?;

        let der = p7
            .to_der()
            .map_err(|e| Error::SigningFailed(format!("Failed to encode PKCS#7 signature: {}", e)))?;

        debug!(
            "Signed {} bytes for {} ({}, detached: {}): {} byte signedData",
            plaintext.len(),
            self.cert.subject(),
            self.digest,
            self.detached,
            der.len()
        );

        Ok(SignedMessage::new(der))
    }
}

/// Sign `plaintext` with SHA-256 and a detached signature.
pub fn sign(key: &PrivateKey, cert: &Certificate, plaintext: &[u8]) -> Result<SignedMessage> {
    Signer::new(key, cert).sign(plaintext)
}

fn build_signed_data(
    key: &PrivateKey,
    cert: &Certificate,
    digest: DigestAlgorithm,
    plaintext: &[u8],
    flags: Pkcs7Flags,
) -> std::result::Result<Pkcs7, ErrorStack> {
    let md = digest.message_digest();
    let input = MemBioSlice::new(plaintext).ok_or_else(ErrorStack::get)?;

    // SAFETY: every pointer passed below is either null where the API allows it
    // or borrowed from a live handle. The PKCS7 is adopted by `Pkcs7` right away
    // so it is freed on all paths; the signer info returned by
    // PKCS7_sign_add_signer is owned by that PKCS7.
    unsafe {
        let raw = pkcs7_ffi::PKCS7_sign(
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
            (flags | Pkcs7Flags::PARTIAL).bits(),
        );
        if raw.is_null() {
            return Err(ErrorStack::get());
        }
        let p7 = Pkcs7::from_ptr(raw);

        let signer_info = pkcs7_ffi::PKCS7_sign_add_signer(
            p7.as_ptr(),
            cert.as_x509().as_ptr(),
            key.as_pkey().as_ptr(),
            md.as_ptr(),
            flags.bits(),
        );
        if signer_info.is_null() {
            return Err(ErrorStack::get());
        }

        if pkcs7_ffi::PKCS7_final(p7.as_ptr(), input.as_ptr(), flags.bits()) <= 0 {
            return Err(ErrorStack::get());
        }

        Ok(p7)
    }
}
