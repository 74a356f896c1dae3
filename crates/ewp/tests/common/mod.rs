//! Shared fixtures for integration tests.
//!
//! Keys and self-signed certificates are generated per test and written as
//! PEM files into a temporary directory, the way a merchant stores them.

#![allow(dead_code)]

use ewp::{Certificate, PrivateKey};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use std::fs;
use std::path::{Path, PathBuf};

/// A key pair with its certificate, both in memory and on disk.
pub struct Identity {
    pub key: PrivateKey,
    pub cert: Certificate,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

pub fn rsa_identity(dir: &Path, name: &str) -> Identity {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    write_identity(dir, name, pkey, 0, 365)
}

pub fn ec_identity(dir: &Path, name: &str) -> Identity {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
    write_identity(dir, name, pkey, 0, 365)
}

/// RSA identity whose certificate expired long ago.
pub fn expired_rsa_identity(dir: &Path, name: &str) -> Identity {
    let pkey = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let cert = build_cert(
        &pkey,
        Asn1Time::from_unix(946_684_800).unwrap(),
        Asn1Time::from_unix(978_307_200).unwrap(),
    );
    store(dir, name, pkey, cert)
}

fn write_identity(dir: &Path, name: &str, pkey: PKey<Private>, from: u32, to: u32) -> Identity {
    let cert = build_cert(
        &pkey,
        Asn1Time::days_from_now(from).unwrap(),
        Asn1Time::days_from_now(to).unwrap(),
    );
    store(dir, name, pkey, cert)
}

fn store(dir: &Path, name: &str, pkey: PKey<Private>, cert: X509) -> Identity {
    let key_path = dir.join(format!("{}.key", name));
    let cert_path = dir.join(format!("{}.crt", name));
    fs::write(&key_path, pkey.private_key_to_pem_pkcs8().unwrap()).unwrap();
    fs::write(&cert_path, cert.to_pem().unwrap()).unwrap();

    Identity {
        key: PrivateKey::from_pkey(pkey),
        cert: Certificate::from_x509(cert),
        key_path,
        cert_path,
    }
}

fn build_cert(pkey: &PKey<Private>, not_before: Asn1Time, not_after: Asn1Time) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "Example Merchant").unwrap();
    name.append_entry_by_text("O", "Example Shop").unwrap();
    let name = name.build();

    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(pkey).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();
    builder.sign(pkey, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Walk a DER buffer as a tree of definite-length TLVs.
///
/// Returns the number of TLVs seen, or a description of the first
/// structural problem. The buffer must be consumed exactly.
pub fn walk_der(buf: &[u8]) -> Result<usize, String> {
    let mut count = 0;
    let mut rest = buf;

    while !rest.is_empty() {
        let (tag, header_len, content_len) = read_header(rest)?;
        let end = header_len
            .checked_add(content_len)
            .filter(|end| *end <= rest.len())
            .ok_or_else(|| format!("TLV with tag {:#04x} overruns its parent", tag))?;

        count += 1;
        if tag & 0x20 != 0 {
            count += walk_der(&rest[header_len..end])?;
        }
        rest = &rest[end..];
    }

    Ok(count)
}

fn read_header(buf: &[u8]) -> Result<(u8, usize, usize), String> {
    let tag = *buf.first().ok_or("missing tag")?;
    if tag & 0x1f == 0x1f {
        return Err("high tag numbers are not used by PKCS#7".into());
    }

    let first = *buf.get(1).ok_or("missing length")? as usize;
    if first < 0x80 {
        return Ok((tag, 2, first));
    }
    if first == 0x80 {
        return Err("indefinite length is not DER".into());
    }

    let count = first & 0x7f;
    let bytes = buf.get(2..2 + count).ok_or("truncated length")?;
    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Ok((tag, 2 + count, len))
}
