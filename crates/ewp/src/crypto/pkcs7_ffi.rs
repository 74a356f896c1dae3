//! Raw FFI bindings for OpenSSL PKCS#7 functions not exposed by rust-openssl
//!
//! `Pkcs7::sign` always signs with the library's default digest. Selecting the
//! digest needs the partial-signing sequence: `PKCS7_sign` with
//! `PKCS7_PARTIAL`, `PKCS7_sign_add_signer`, then `PKCS7_final`.

#![allow(non_camel_case_types)]

use openssl_sys::{stack_st_X509, BIO_new_mem_buf, BIO, EVP_MD, EVP_PKEY, PKCS7, X509};
use std::ffi::{c_char, c_int, c_long, c_void};

// PKCS7_ctrl command backing the PKCS7_get_detached() macro
pub const PKCS7_OP_GET_DETACHED_SIGNATURE: c_int = 2;

// PKCS7_SIGNER_INFO is opaque and owned by the PKCS7 it was added to
#[repr(C)]
pub struct PKCS7_SIGNER_INFO {
    _private: [u8; 0],
}

extern "C" {
    pub fn PKCS7_sign(
        signcert: *mut X509,
        pkey: *mut EVP_PKEY,
        certs: *mut stack_st_X509,
        data: *mut BIO,
        flags: c_int,
    ) -> *mut PKCS7;

    pub fn PKCS7_sign_add_signer(
        p7: *mut PKCS7,
        signcert: *mut X509,
        pkey: *mut EVP_PKEY,
        md: *const EVP_MD,
        flags: c_int,
    ) -> *mut PKCS7_SIGNER_INFO;

    pub fn PKCS7_final(p7: *mut PKCS7, data: *mut BIO, flags: c_int) -> c_int;

    pub fn PKCS7_ctrl(p7: *mut PKCS7, cmd: c_int, larg: c_long, parg: *mut c_char) -> c_long;

    pub fn BIO_free(b: *mut BIO) -> c_int;
}

/// Read-only memory BIO over a borrowed slice, freed on drop.
pub struct MemBioSlice<'a> {
    bio: *mut BIO,
    _data: std::marker::PhantomData<&'a [u8]>,
}

impl<'a> MemBioSlice<'a> {
    /// Returns `None` if the slice is too large for a BIO or allocation fails.
    pub fn new(data: &'a [u8]) -> Option<Self> {
        let len = c_int::try_from(data.len()).ok()?;

        // SAFETY: the BIO only reads `len` bytes from `data`, which outlives it
        // through the `'a` lifetime.
        let bio = unsafe { BIO_new_mem_buf(data.as_ptr() as *const c_void, len) };
        if bio.is_null() {
            return None;
        }

        Some(Self {
            bio,
            _data: std::marker::PhantomData,
        })
    }

    pub fn as_ptr(&self) -> *mut BIO {
        self.bio
    }
}

impl Drop for MemBioSlice<'_> {
    fn drop(&mut self) {
        // SAFETY: `bio` was returned non-null by BIO_new_mem_buf and is freed once.
        unsafe {
            BIO_free(self.bio);
        }
    }
}
