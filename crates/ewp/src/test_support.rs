//! Key and certificate fixtures generated at test time.

use crate::crypto::{Certificate, PrivateKey};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509Builder, X509NameBuilder};
use std::fs;
use std::path::{Path, PathBuf};

/// Fresh 2048-bit RSA key with a matching self-signed certificate.
pub(crate) fn rsa_identity() -> (PrivateKey, Certificate) {
    let key = PrivateKey::from_pkey(PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap());
    let cert = self_signed_cert(
        &key,
        Asn1Time::days_from_now(0).unwrap(),
        Asn1Time::days_from_now(365).unwrap(),
    );
    (key, cert)
}

/// Fresh P-256 key with a matching self-signed certificate.
pub(crate) fn ec_identity() -> (PrivateKey, Certificate) {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = EcKey::generate(&group).unwrap();
    let key = PrivateKey::from_pkey(PKey::from_ec_key(ec_key).unwrap());
    let cert = self_signed_cert(
        &key,
        Asn1Time::days_from_now(0).unwrap(),
        Asn1Time::days_from_now(365).unwrap(),
    );
    (key, cert)
}

/// Self-signed certificate for `key` with an explicit validity window.
pub(crate) fn self_signed_cert(
    key: &PrivateKey,
    not_before: Asn1Time,
    not_after: Asn1Time,
) -> Certificate {
    let mut name_builder = X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("CN", "Test Merchant").unwrap();
    let name = name_builder.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();

    // Random serials keep issuer-and-serial recipient lookups distinct
    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key.as_pkey()).unwrap();
    builder.set_not_before(&not_before).unwrap();
    builder.set_not_after(&not_after).unwrap();

    builder.sign(key.as_pkey(), MessageDigest::sha256()).unwrap();
    Certificate::from_x509(builder.build())
}

/// Write `key` and `cert` as PEM files named `<name>.key` / `<name>.crt` in `dir`.
pub(crate) fn write_identity(
    dir: &Path,
    name: &str,
    key: &PrivateKey,
    cert: &Certificate,
) -> (PathBuf, PathBuf) {
    let key_path = dir.join(format!("{}.key", name));
    let cert_path = dir.join(format!("{}.crt", name));

    fs::write(&key_path, key.as_pkey().private_key_to_pem_pkcs8().unwrap()).unwrap();
    fs::write(&cert_path, cert.as_x509().to_pem().unwrap()).unwrap();

    (key_path, cert_path)
}
