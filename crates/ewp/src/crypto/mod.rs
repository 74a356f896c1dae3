pub mod algorithms;
pub mod assets;
pub mod encryptor;
pub mod pkcs7_ffi;
pub mod signer;

pub use algorithms::{ContentCipher, DigestAlgorithm};
pub use assets::{
    load_certificate, load_private_key, load_private_key_with_passphrase, Certificate,
    PrivateKey, Validity,
};
pub use encryptor::{encrypt, Encryptor};
pub use signer::{sign, Signer};
