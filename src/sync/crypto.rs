//! Encryption for progress files
//!
//! AES-256-GCM with an Argon2id key derived from the sync passphrase.
//! Each file gets a fresh salt and nonce.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Result};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32;
const SCHEME_VERSION: u8 = 1;

/// Encrypted progress envelope, stored as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    /// Base64 ciphertext
    pub ciphertext: String,
    /// Base64 nonce
    pub nonce: String,
    /// Base64 Argon2 salt
    pub salt: String,
    pub version: u8,
}

fn cipher_for(passphrase: &str, salt: &[u8]) -> Result<Aes256Gcm> {
    let mut key = [0u8; KEY_LENGTH];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
    Ok(Aes256Gcm::new(GenericArray::from_slice(&key)))
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|e| anyhow!("Invalid {} encoding: {}", field, e))
}

pub fn encrypt_data(plaintext: &[u8], passphrase: &str) -> Result<EncryptedData> {
    let mut salt = [0u8; SALT_LENGTH];
    let mut nonce = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher_for(passphrase, &salt)?
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok(EncryptedData {
        ciphertext: BASE64.encode(ciphertext),
        nonce: BASE64.encode(nonce),
        salt: BASE64.encode(salt),
        version: SCHEME_VERSION,
    })
}

pub fn decrypt_data(encrypted: &EncryptedData, passphrase: &str) -> Result<Vec<u8>> {
    if encrypted.version != SCHEME_VERSION {
        return Err(anyhow!("Unsupported encryption version: {}", encrypted.version));
    }

    let salt = decode("salt", &encrypted.salt)?;
    let nonce = decode("nonce", &encrypted.nonce)?;
    if nonce.len() != NONCE_LENGTH {
        return Err(anyhow!("Invalid nonce length: {}", nonce.len()));
    }
    let ciphertext = decode("ciphertext", &encrypted.ciphertext)?;

    cipher_for(passphrase, &salt)?
        .decrypt(Nonce::from_slice(&nonce), ciphertext.as_ref())
        .map_err(|_| anyhow!("Decryption failed: invalid passphrase or corrupted data"))
}

pub fn encrypt_string(plaintext: &str, passphrase: &str) -> Result<EncryptedData> {
    encrypt_data(plaintext.as_bytes(), passphrase)
}

pub fn decrypt_string(encrypted: &EncryptedData, passphrase: &str) -> Result<String> {
    let bytes = decrypt_data(encrypted, passphrase)?;
    String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8 in decrypted data: {}", e))
}

/// Anonymized identifier for the exporting device
pub fn hash_device_id(device: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    device.hash(&mut hasher);
    "wordloop-device-salt".hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_string() {
        let plaintext = r#"{"word_states":[{"word":"naïve","level":2}],"note":"陌生 认识 熟练 掌握"}"#;
        let encrypted = encrypt_string(plaintext, "sync-key").unwrap();
        assert_ne!(encrypted.ciphertext, plaintext);
        assert_eq!(decrypt_string(&encrypted, "sync-key").unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let encrypted = encrypt_data(b"apple level=2", "right").unwrap();
        let err = decrypt_data(&encrypted, "wrong").unwrap_err();
        assert!(err.to_string().contains("Decryption failed"));
    }

    #[test]
    fn test_fresh_nonce_per_file() {
        let a = encrypt_data(b"same", "key").unwrap();
        let b = encrypt_data(b"same", "key").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_envelope_survives_json() {
        let encrypted = encrypt_data(b"payload", "key").unwrap();
        let json = serde_json::to_string(&encrypted).unwrap();
        let back: EncryptedData = serde_json::from_str(&json).unwrap();
        assert_eq!(decrypt_data(&back, "key").unwrap(), b"payload");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut encrypted = encrypt_data(b"payload", "key").unwrap();
        encrypted.version = 9;
        assert!(decrypt_data(&encrypted, "key").is_err());
    }

    #[test]
    fn test_hash_device_id() {
        let a = hash_device_id("laptop:/home/ann");
        assert_ne!(a, hash_device_id("phone:/data/ann"));
        assert_eq!(a, hash_device_id("laptop:/home/ann"));
        assert_eq!(a.len(), 16);
    }
}
