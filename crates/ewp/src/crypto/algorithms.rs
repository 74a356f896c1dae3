//! Digest and content-encryption algorithm selection.
//!
//! Both choices are explicit: nothing falls back to whatever the linked
//! OpenSSL happens to default to.

use crate::{Error, Result};
use openssl::hash::MessageDigest;
use openssl::symm::Cipher;
use std::fmt;
use std::str::FromStr;

/// Message digest used for the signer's signed attributes and signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    Sha1,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub const ALL: [DigestAlgorithm; 4] = [
        DigestAlgorithm::Sha1,
        DigestAlgorithm::Sha256,
        DigestAlgorithm::Sha384,
        DigestAlgorithm::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        }
    }

    pub(crate) fn message_digest(self) -> MessageDigest {
        match self {
            DigestAlgorithm::Sha1 => MessageDigest::sha1(),
            DigestAlgorithm::Sha256 => MessageDigest::sha256(),
            DigestAlgorithm::Sha384 => MessageDigest::sha384(),
            DigestAlgorithm::Sha512 => MessageDigest::sha512(),
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_ascii_lowercase().replace('-', "");
        Self::ALL
            .into_iter()
            .find(|d| d.name() == normalized)
            .ok_or_else(|| Error::Config(format!("Unknown digest algorithm: {}", s)))
    }
}

/// Symmetric cipher protecting the content of an `envelopedData` message.
///
/// PKCS#7 `envelopedData` only carries CBC-mode ciphers, so the default is
/// AES-256-CBC. [`ContentCipher::Rc2_40Cbc`] is the cipher PayPal's legacy
/// integration guide asked for; a 40-bit key is trivially brute-forced and it
/// must only be selected when the receiving side accepts nothing else.
/// Recent OpenSSL releases only provide RC2 through the legacy provider, and
/// encryption fails with [`Error::EncryptionFailed`] when it is not loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentCipher {
    Aes128Cbc,
    Aes192Cbc,
    #[default]
    Aes256Cbc,
    /// Three-key triple DES. Weak, kept for legacy receivers.
    DesEde3Cbc,
    /// 40-bit RC2. Broken, kept for legacy receivers.
    Rc2_40Cbc,
}

impl ContentCipher {
    pub const ALL: [ContentCipher; 5] = [
        ContentCipher::Aes128Cbc,
        ContentCipher::Aes192Cbc,
        ContentCipher::Aes256Cbc,
        ContentCipher::DesEde3Cbc,
        ContentCipher::Rc2_40Cbc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ContentCipher::Aes128Cbc => "aes-128-cbc",
            ContentCipher::Aes192Cbc => "aes-192-cbc",
            ContentCipher::Aes256Cbc => "aes-256-cbc",
            ContentCipher::DesEde3Cbc => "des-ede3-cbc",
            ContentCipher::Rc2_40Cbc => "rc2-40-cbc",
        }
    }

    /// Whether the cipher is only offered for compatibility with old receivers.
    pub fn is_legacy(self) -> bool {
        matches!(self, ContentCipher::DesEde3Cbc | ContentCipher::Rc2_40Cbc)
    }

    pub(crate) fn cipher(self) -> Cipher {
        match self {
            ContentCipher::Aes128Cbc => Cipher::aes_128_cbc(),
            ContentCipher::Aes192Cbc => Cipher::aes_192_cbc(),
            ContentCipher::Aes256Cbc => Cipher::aes_256_cbc(),
            ContentCipher::DesEde3Cbc => Cipher::des_ede3_cbc(),
            ContentCipher::Rc2_40Cbc => Cipher::rc2_40_cbc(),
        }
    }

    /// Make sure the linked OpenSSL can run this cipher.
    ///
    /// OpenSSL 3 moved RC2 into the `legacy` provider, which is loaded on
    /// first use and kept for the life of the process.
    pub(crate) fn ensure_available(self) -> Result<()> {
        if self == ContentCipher::Rc2_40Cbc && !load_legacy_provider() {
            return Err(Error::EncryptionFailed(format!(
                "{} needs the OpenSSL legacy provider, which could not be loaded",
                self
            )));
        }
        Ok(())
    }
}

/// Load OpenSSL's `legacy` provider once, keeping the default provider active.
///
/// Returns whether legacy algorithms such as RC2 are usable.
#[cfg(ossl300)]
pub(crate) fn load_legacy_provider() -> bool {
    use openssl::provider::Provider;
    use std::sync::OnceLock;

    static LEGACY: OnceLock<Option<Provider>> = OnceLock::new();

    LEGACY
        .get_or_init(|| match Provider::try_load(None, "legacy", true) {
            Ok(provider) => {
                log::debug!("Loaded OpenSSL legacy provider");
                Some(provider)
            }
            Err(e) => {
                log::warn!("OpenSSL legacy provider unavailable: {}", e);
                None
            }
        })
        .is_some()
}

/// OpenSSL before 3.0 has no providers; RC2 is built in.
#[cfg(not(ossl300))]
pub(crate) fn load_legacy_provider() -> bool {
    true
}

impl fmt::Display for ContentCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentCipher {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.name() == normalized)
            .ok_or_else(|| Error::Config(format!("Unknown content cipher: {}", s)))
    }
}
