//! Encryption capabilities for envelope payloads.
//!
//! The codec core treats encryption as a pluggable capability: anything
//! implementing [`Encryptor`] can be registered under a two-character id
//! and selected through the envelope header. The reserved id `"NO"` means
//! no encryption and is handled by the orchestration layer itself, so it
//! can never be registered.
//!
//! One implementation ships with the crate: [`SharedSecretEncryptor`],
//! authenticated symmetric encryption under a registry of labelled
//! passphrase-derived secrets.

pub mod compression;
pub mod shared_secret;

pub use compression::{deflate, inflate, CompressionError};
pub use shared_secret::SharedSecretEncryptor;

use std::collections::HashMap;
use thiserror::Error;

use crate::encoding::base64_index;

/// Reserved encryption id meaning "no encryption".
pub const NO_ENCRYPTION: &str = "NO";

/// Errors raised by encryptors and their registry.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryptor id {0:?} is not two base-64 characters")]
    InvalidEncryptorId(String),

    #[error("encryptor id {0:?} is already registered")]
    DuplicateEncryptorId(String),

    #[error("encryptor id \"NO\" is reserved for no encryption")]
    ReservedEncryptorId,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("ciphertext too short")]
    CiphertextTooShort,

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("unknown secret needed for decryption; label {0:?}")]
    UnknownSecret(String),

    #[error("secret label {0:?} is invalid")]
    InvalidSecretLabel(String),
}

/// A reversible byte-level encryption capability.
///
/// `decrypt(encrypt(b)) == b` must hold for every byte sequence `b` as long
/// as the encryptor's own state (keys, selected secret) is unchanged in
/// between. Failed authentication on decrypt is an error, not garbage.
pub trait Encryptor: Send + Sync {
    /// Encrypts a payload.
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypts a payload produced by `encrypt`.
    fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Identifying pair of characters from the 64-symbol alphabet.
    fn id(&self) -> &'static str;

    /// Short display name.
    fn name(&self) -> &'static str;

    /// Human-readable summary of the scheme, for display.
    fn description(&self) -> &'static str;
}

/// Registry of encryptors keyed by their two-character id.
pub struct EncryptorRegistry {
    encryptors: HashMap<String, Box<dyn Encryptor>>,
}

impl EncryptorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            encryptors: HashMap::new(),
        }
    }

    /// Registers an encryptor under its own id.
    ///
    /// Fails if the id is not exactly two alphabet characters, collides
    /// with the reserved `"NO"`, or is already taken.
    pub fn register(&mut self, encryptor: Box<dyn Encryptor>) -> Result<(), CryptoError> {
        let id = encryptor.id();

        if id.chars().count() != 2 || !id.chars().all(|c| base64_index(c).is_some()) {
            return Err(CryptoError::InvalidEncryptorId(id.to_string()));
        }
        if id == NO_ENCRYPTION {
            return Err(CryptoError::ReservedEncryptorId);
        }
        if self.encryptors.contains_key(id) {
            return Err(CryptoError::DuplicateEncryptorId(id.to_string()));
        }

        self.encryptors.insert(id.to_string(), encryptor);
        Ok(())
    }

    /// Looks up an encryptor by id.
    pub fn get(&self, id: &str) -> Option<&dyn Encryptor> {
        self.encryptors.get(id).map(|e| e.as_ref())
    }

    /// Iterates over registered encryptors.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Encryptor> {
        self.encryptors.values().map(|e| e.as_ref())
    }
}

impl Default for EncryptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
