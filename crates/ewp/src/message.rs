//! Signed and encrypted PKCS#7 messages
//!
//! Both message types hold the DER encoding produced by the signer or the
//! encryptor. They render to PEM for HTML form fields, and expose the
//! receiving-side checks (verify, decrypt) used to self-check output.

use crate::crypto::algorithms::load_legacy_provider;
use crate::crypto::pkcs7_ffi;
use crate::crypto::{Certificate, PrivateKey};
use crate::{Error, Result};
use foreign_types::ForeignType;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use std::fmt;
use std::ptr;
use std::str::FromStr;

/// PKCS#7 signedData content type OID: 1.2.840.113549.1.7.2
pub const SIGNED_DATA_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x02];

/// PKCS#7 envelopedData content type OID: 1.2.840.113549.1.7.3
pub const ENVELOPED_DATA_OID: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x03];

// DER-encoded rc2-cbc algorithm identifier OID: 1.2.840.113549.3.2
const RC2_CBC_OID: &[u8] = &[0x06, 0x08, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x03, 0x02];

/// Output encoding for messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Binary DER, the form OpenSSL's `-inform DER` reads.
    #[default]
    Der,
    /// `-----BEGIN PKCS7-----` text, the form pasted into an EWP form's `encrypted` field.
    Pem,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Der => f.write_str("der"),
            OutputFormat::Pem => f.write_str("pem"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "der" => Ok(OutputFormat::Der),
            "pem" => Ok(OutputFormat::Pem),
            _ => Err(Error::Config(format!("Unknown output format: {}", s))),
        }
    }
}

/// DER-encoded PKCS#7 `signedData`.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedMessage {
    der: Vec<u8>,
}

impl SignedMessage {
    pub(crate) fn new(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Parse a DER `signedData` received from elsewhere.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        expect_content_type(&der, SIGNED_DATA_OID, "signedData")?;
        Ok(Self { der })
    }

    /// Parse a PEM `signedData`.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_der(pem_to_der(pem)?)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        der_to_pem(&self.der)
    }

    /// Encode in the requested output format.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Der => Ok(self.der.clone()),
            OutputFormat::Pem => self.to_pem(),
        }
    }

    /// Whether the message omits the signed content.
    pub fn is_detached(&self) -> Result<bool> {
        let p7 = parse(&self.der)?;
        Ok(is_detached(&p7))
    }

    /// Verify the signature against `cert` and return the signed content.
    ///
    /// Only `cert` is consulted for the signer's public key and no chain
    /// validation is performed, matching `openssl smime -verify -noverify`.
    /// Detached messages need `content`; for embedded ones, a supplied
    /// `content` must equal the embedded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VerificationFailed`] if the signature does not verify,
    /// the content is missing or different, or `cert` is not the signer.
    pub fn verify(&self, content: Option<&[u8]>, cert: &Certificate) -> Result<Vec<u8>> {
        crate::init();

        let p7 = parse(&self.der)?;
        let detached = is_detached(&p7);
        if detached && content.is_none() {
            return Err(Error::VerificationFailed(
                "Detached signature requires the signed content".into(),
            ));
        }

        let failed = |e: openssl::error::ErrorStack| Error::VerificationFailed(e.to_string());

        let mut certs: Stack<X509> = Stack::new().map_err(failed)?;
        certs.push(cert.as_x509().to_owned()).map_err(failed)?;
        let store = X509StoreBuilder::new().map_err(failed)?.build();

        let flags = Pkcs7Flags::NOINTERN | Pkcs7Flags::NOVERIFY | Pkcs7Flags::BINARY;
        let indata = if detached { content } else { None };
        let mut out = Vec::new();

        p7.verify(&certs, &store, indata, Some(&mut out), flags)
            .map_err(failed)?;

        if let Some(expected) = content {
            if expected != out.as_slice() {
                return Err(Error::VerificationFailed(
                    "Embedded content differs from the supplied content".into(),
                ));
            }
        }

        Ok(out)
    }
}

impl fmt::Debug for SignedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedMessage")
            .field("len", &self.der.len())
            .finish()
    }
}

/// DER-encoded PKCS#7 `envelopedData`.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    der: Vec<u8>,
}

impl EncryptedMessage {
    pub(crate) fn new(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// Parse a DER `envelopedData` received from elsewhere.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        expect_content_type(&der, ENVELOPED_DATA_OID, "envelopedData")?;
        Ok(Self { der })
    }

    /// Parse a PEM `envelopedData`.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        Self::from_der(pem_to_der(pem)?)
    }

    pub fn as_der(&self) -> &[u8] {
        &self.der
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }

    pub fn to_pem(&self) -> Result<Vec<u8>> {
        der_to_pem(&self.der)
    }

    /// Encode in the requested output format.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Der => Ok(self.der.clone()),
            OutputFormat::Pem => self.to_pem(),
        }
    }

    /// Decrypt with the recipient's key and certificate.
    pub fn decrypt(&self, key: &PrivateKey, cert: &Certificate) -> Result<Vec<u8>> {
        crate::init();

        let p7 = parse(&self.der)?;
        if contains(&self.der, RC2_CBC_OID) {
            load_legacy_provider();
        }
        p7.decrypt(key.as_pkey(), cert.as_x509(), Pkcs7Flags::BINARY)
            .map_err(|e| Error::DecryptionFailed(e.to_string()))
    }
}

impl fmt::Debug for EncryptedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedMessage")
            .field("len", &self.der.len())
            .finish()
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn parse(der: &[u8]) -> Result<Pkcs7> {
    crate::init();
    Pkcs7::from_der(der).map_err(|e| Error::InvalidMessage(e.to_string()))
}

fn pem_to_der(pem: &[u8]) -> Result<Vec<u8>> {
    crate::init();
    Pkcs7::from_pem(pem)
        .and_then(|p7| p7.to_der())
        .map_err(|e| Error::InvalidMessage(e.to_string()))
}

fn der_to_pem(der: &[u8]) -> Result<Vec<u8>> {
    parse(der)?
        .to_pem()
        .map_err(|e| Error::InvalidMessage(e.to_string()))
}

fn is_detached(p7: &Pkcs7) -> bool {
    // SAFETY: the GET_DETACHED_SIGNATURE control only inspects `p7` and
    // records the answer in its own `detached` field.
    let ret = unsafe {
        pkcs7_ffi::PKCS7_ctrl(
            p7.as_ptr(),
            pkcs7_ffi::PKCS7_OP_GET_DETACHED_SIGNATURE,
            0,
            ptr::null_mut(),
        )
    };
    ret == 1
}

fn expect_content_type(der: &[u8], oid: &[u8], name: &str) -> Result<()> {
    match content_type(der) {
        Some(found) if found == oid => {}
        Some(_) => {
            return Err(Error::InvalidMessage(format!(
                "PKCS#7 content type is not {}",
                name
            )))
        }
        None => return Err(Error::InvalidMessage("Not a DER ContentInfo".into())),
    }
    parse(der).map(|_| ())
}

/// Content type OID bytes of a DER `ContentInfo ::= SEQUENCE { contentType OID, ... }`.
pub(crate) fn content_type(der: &[u8]) -> Option<&[u8]> {
    let (&tag, rest) = der.split_first()?;
    if tag != 0x30 {
        return None;
    }
    let rest = skip_length(rest)?;

    let (&oid_tag, rest) = rest.split_first()?;
    if oid_tag != 0x06 {
        return None;
    }
    let (&len, rest) = rest.split_first()?;
    if len & 0x80 != 0 {
        return None;
    }
    rest.get(..len as usize)
}

fn skip_length(buf: &[u8]) -> Option<&[u8]> {
    let (&first, rest) = buf.split_first()?;
    match first {
        // short form, or BER indefinite length
        0x00..=0x80 => Some(rest),
        long => rest.get((long & 0x7f) as usize..),
    }
}
