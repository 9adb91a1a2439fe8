//! Shared-secret authenticated encryption.
//!
//! Both parties hold the same labelled passphrase; the key is derived with
//! HKDF-SHA256 and payloads are sealed with ChaCha20-Poly1305. The label
//! travels in clear inside the ciphertext envelope so the receiver can pick
//! the right secret out of its own registry without trial decryption.
//!
//! Wire format: `scheme tag (3 bytes)` + `label length (1 byte)` +
//! `label (UTF-8)` + `nonce (12 bytes)` + `ciphertext with auth tag`.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::collections::HashMap;

use super::{CryptoError, Encryptor};

/// Scheme tag for ChaCha20-Poly1305 under an HKDF-SHA256 key.
const SCHEME_TAG: &[u8; 3] = b"CC1";

/// HKDF info string for key derivation.
const HKDF_INFO: &[u8] = b"plainsight-shared-secret";

/// Nonce size for ChaCha20-Poly1305.
const NONCE_SIZE: usize = 12;

/// A labelled symmetric key derived from a passphrase.
#[derive(Clone)]
struct Secret {
    label: String,
    key: [u8; 32],
}

impl Secret {
    fn derive(label: &str, passphrase: &str) -> Result<Self, CryptoError> {
        let label = label.to_uppercase();
        if label.is_empty() || label.len() > 255 {
            return Err(CryptoError::InvalidSecretLabel(label));
        }

        // The label salts the derivation, so the same passphrase under two
        // labels yields unrelated keys.
        let hk = Hkdf::<Sha256>::new(Some(label.as_bytes()), passphrase.as_bytes());
        let mut key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(Self { label, key })
    }
}

/// Encryptor keeping a registry of labelled shared secrets.
///
/// One secret is selected for encryption at a time; decryption picks the
/// secret named by the incoming envelope. A `DEFAULT` secret always exists
/// so the encryptor is usable out of the box, though anything serious
/// should add its own.
pub struct SharedSecretEncryptor {
    secrets: HashMap<String, Secret>,
    current: String,
}

impl SharedSecretEncryptor {
    /// Creates the encryptor with only the well-known `DEFAULT` secret.
    pub fn new() -> Self {
        let default =
            Secret::derive("DEFAULT", "password").expect("static label is valid");

        let mut secrets = HashMap::new();
        secrets.insert(default.label.clone(), default);

        Self {
            secrets,
            current: "DEFAULT".to_string(),
        }
    }

    /// Creates the encryptor with one custom secret selected.
    pub fn with_secret(label: &str, passphrase: &str) -> Result<Self, CryptoError> {
        let mut out = Self::new();
        out.add_secret(label, passphrase)?;
        out.select_secret(label)?;
        Ok(out)
    }

    /// Derives and stores a secret, replacing any existing one under the
    /// same label. Labels are case-insensitive and at most 255 bytes.
    pub fn add_secret(&mut self, label: &str, passphrase: &str) -> Result<(), CryptoError> {
        let secret = Secret::derive(label, passphrase)?;
        self.secrets.insert(secret.label.clone(), secret);
        Ok(())
    }

    /// Removes a secret. Removing the selected secret leaves encryption
    /// unusable until another selection is made.
    pub fn remove_secret(&mut self, label: &str) {
        self.secrets.remove(&label.to_uppercase());
    }

    /// Selects the secret used for encryption.
    pub fn select_secret(&mut self, label: &str) -> Result<(), CryptoError> {
        let label = label.to_uppercase();
        if !self.secrets.contains_key(&label) {
            return Err(CryptoError::UnknownSecret(label));
        }
        self.current = label;
        Ok(())
    }

    /// Label of the currently selected secret.
    pub fn selected(&self) -> &str {
        &self.current
    }

    /// All registered labels.
    pub fn labels(&self) -> Vec<&str> {
        self.secrets.keys().map(String::as_str).collect()
    }
}

impl Default for SharedSecretEncryptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Encryptor for SharedSecretEncryptor {
    fn encrypt(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let secret = self
            .secrets
            .get(&self.current)
            .ok_or_else(|| CryptoError::UnknownSecret(self.current.clone()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&secret.key)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(nonce, input)
            .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

        let label = secret.label.as_bytes();
        let mut out = Vec::with_capacity(4 + label.len() + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(SCHEME_TAG);
        out.push(label.len() as u8);
        out.extend_from_slice(label);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);

        Ok(out)
    }

    fn decrypt(&self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        // Tag, label length, at least one label byte, nonce, auth tag.
        if input.len() < 4 + 1 + NONCE_SIZE + 16 {
            return Err(CryptoError::CiphertextTooShort);
        }

        if &input[..3] != SCHEME_TAG {
            return Err(CryptoError::DecryptionFailed(format!(
                "unknown scheme tag {:02X?}",
                &input[..3]
            )));
        }

        let label_len = input[3] as usize;
        if label_len == 0 || input.len() < 4 + label_len + NONCE_SIZE + 16 {
            return Err(CryptoError::CiphertextTooShort);
        }

        let label = String::from_utf8_lossy(&input[4..4 + label_len]).into_owned();
        let secret = self
            .secrets
            .get(&label)
            .ok_or(CryptoError::UnknownSecret(label))?;

        let nonce_start = 4 + label_len;
        let nonce = Nonce::from_slice(&input[nonce_start..nonce_start + NONCE_SIZE]);
        let ciphertext = &input[nonce_start + NONCE_SIZE..];

        let cipher = ChaCha20Poly1305::new_from_slice(&secret.key)
            .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed("authentication failed".to_string()))
    }

    fn id(&self) -> &'static str {
        "SS"
    }

    fn name(&self) -> &'static str {
        "Shared Secret"
    }

    fn description(&self) -> &'static str {
        "Authenticated symmetric encryption (ChaCha20-Poly1305) under a \
         passphrase-derived key. Both parties must hold the same secret \
         under the same label; the label rides along in clear so the \
         receiver knows which secret to use."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_with_default_secret() {
        let enc = SharedSecretEncryptor::new();
        let plaintext = b"meet at dawn";

        let sealed = enc.encrypt(plaintext).unwrap();
        assert_ne!(&sealed, plaintext);
        assert_eq!(enc.decrypt(&sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_with_custom_secret() {
        let enc = SharedSecretEncryptor::with_secret("ours", "correct horse").unwrap();
        assert_eq!(enc.selected(), "OURS");

        let sealed = enc.encrypt(b"payload").unwrap();
        assert_eq!(enc.decrypt(&sealed).unwrap(), b"payload");
    }

    #[test]
    fn test_wrong_passphrase_fails_authentication() {
        let sender = SharedSecretEncryptor::with_secret("pact", "alpha").unwrap();
        let receiver = SharedSecretEncryptor::with_secret("pact", "beta").unwrap();

        let sealed = sender.encrypt(b"secret").unwrap();
        let result = receiver.decrypt(&sealed);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_unknown_label_is_reported() {
        let sender = SharedSecretEncryptor::with_secret("theirs", "pass").unwrap();
        let receiver = SharedSecretEncryptor::new();

        let sealed = sender.encrypt(b"secret").unwrap();
        let result = receiver.decrypt(&sealed);
        assert!(matches!(result, Err(CryptoError::UnknownSecret(l)) if l == "THEIRS"));
    }

    #[test]
    fn test_labels_are_case_insensitive() {
        let mut enc = SharedSecretEncryptor::new();
        enc.add_secret("Mixed Case", "pass").unwrap();
        enc.select_secret("mixed case").unwrap();
        assert_eq!(enc.selected(), "MIXED CASE");
    }

    #[test]
    fn test_empty_label_rejected() {
        let mut enc = SharedSecretEncryptor::new();
        let result = enc.add_secret("", "pass");
        assert!(matches!(result, Err(CryptoError::InvalidSecretLabel(_))));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let enc = SharedSecretEncryptor::new();
        assert!(matches!(
            enc.decrypt(&[0u8; 8]),
            Err(CryptoError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_empty_plaintext_roundtrip() {
        let enc = SharedSecretEncryptor::new();
        let sealed = enc.encrypt(&[]).unwrap();
        assert_eq!(enc.decrypt(&sealed).unwrap(), Vec::<u8>::new());
    }
}
