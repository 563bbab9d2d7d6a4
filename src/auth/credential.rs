//! Password encryption for the CAS login form
//!
//! The portal expects textbook RSA over a hand-built block:
//! `00 00 | zero padding | 00 | message bytes reversed`, sized to the
//! modulus. There are no random padding bytes, so the same password and key
//! always produce the same ciphertext. The portal additionally reverses the
//! password string before encryption.

use crate::{Error, Result};
use num_bigint::BigUint;
use serde::Deserialize;

/// Bytes taken by the fixed block markers
const BLOCK_OVERHEAD: usize = 3;

/// Public key material as served by the portal
#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyMaterial {
    /// Hex-encoded public exponent
    pub exponent: String,
    /// Hex-encoded modulus
    pub modulus: String,
}

/// Encrypt-only RSA with the portal's padding
#[derive(Debug, Clone)]
pub struct CredentialEncoder {
    exponent: BigUint,
    modulus: BigUint,
    key_len: usize,
}

impl CredentialEncoder {
    /// Build from hex exponent and modulus
    pub fn new(exponent_hex: &str, modulus_hex: &str) -> Result<Self> {
        let exponent = parse_hex("exponent", exponent_hex)?;
        let modulus = parse_hex("modulus", modulus_hex)?;

        if modulus.bits() == 0 {
            return Err(Error::upstream("public_key", "modulus is zero"));
        }

        let key_len = modulus.bits().div_ceil(8) as usize;

        Ok(Self {
            exponent,
            modulus,
            key_len,
        })
    }

    pub fn from_material(material: &PublicKeyMaterial) -> Result<Self> {
        Self::new(&material.exponent, &material.modulus)
    }

    /// Modulus size in bytes
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Ciphertext of `message` as fixed-width lowercase hex
    pub fn encrypt(&self, message: &str) -> Result<String> {
        let bytes = message.as_bytes();
        if bytes.len() + BLOCK_OVERHEAD > self.key_len {
            return Err(Error::validation(
                "password",
                format!(
                    "message of {} bytes does not fit a {}-byte key",
                    bytes.len(),
                    self.key_len
                ),
            ));
        }

        // Leading zero bytes vanish in the integer, so the block's value is
        // just the reversed message read big-endian.
        let mut block = vec![0u8; self.key_len];
        for (slot, byte) in block[self.key_len - bytes.len()..]
            .iter_mut()
            .zip(bytes.iter().rev())
        {
            *slot = *byte;
        }

        let payload = BigUint::from_bytes_be(&block);
        let cipher = payload.modpow(&self.exponent, &self.modulus).to_bytes_be();

        let mut out = vec![0u8; self.key_len - cipher.len()];
        out.extend_from_slice(&cipher);
        Ok(hex::encode(out))
    }

    /// Login-form value for `password`: the reversed string, encrypted
    pub fn encrypt_password(&self, password: &str) -> Result<String> {
        let reversed: String = password.chars().rev().collect();
        self.encrypt(&reversed)
    }
}

fn parse_hex(field: &str, value: &str) -> Result<BigUint> {
    BigUint::parse_bytes(value.trim().as_bytes(), 16)
        .ok_or_else(|| Error::upstream("public_key", format!("{} is not valid hex", field)))
}
