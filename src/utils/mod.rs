//! Utility functions and helpers
//!
//! This module contains cryptographic utilities, the canonical encoding,
//! and other helper functions used throughout the node.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, new_key_pair,
    public_key_from_pkcs8, sha256_digest, sha256_hex,
};

pub use serialization::{deserialize, hex_bytes, serialize};
