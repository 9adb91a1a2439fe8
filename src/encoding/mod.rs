//! Text encoders: reversible mappings from byte buffers to character streams.
//!
//! Every encoder emits only characters from its own declared character set
//! and tolerates foreign characters on the way back in: decoding skips
//! anything it does not recognise and trims trailing garbage instead of
//! failing. This is what lets an encoded payload survive being pasted into
//! chat clients, documents, or other text that mangles its surroundings.
//!
//! Encoders are identified by a single character from the 64-symbol alphabet
//! `0-9 A-Z a-z - _` and dispatched through a fixed 64-slot registry.

mod base64url;
mod cjk4096;
mod emoji256;
mod hex;

pub use base64url::Base64Url;
pub use cjk4096::Cjk4096;
pub use emoji256::Emoji256;
pub use hex::Hex;

use thiserror::Error;

/// Errors raised while configuring the encoder registry.
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("encoder id '{0}' is not a base-64 character")]
    InvalidEncoderId(char),

    #[error("encoder id '{0}' is already registered")]
    DuplicateEncoderId(char),
}

/// A reversible byte-to-text encoding.
///
/// `from(to(b)) == b` must hold for every byte sequence `b`. `from` never
/// fails: characters outside the encoder's character set are skipped and
/// trailing garbage is trimmed rather than zero-padded.
pub trait TextEncoder: Send + Sync {
    /// Encodes bytes into this encoding's character set.
    fn to(&self, input: &[u8]) -> String;

    /// Decodes text back to bytes, skipping foreign characters.
    fn from(&self, input: &str) -> Vec<u8>;

    /// Single identifying character from the 64-symbol alphabet.
    fn id(&self) -> char;

    /// Short display name.
    fn name(&self) -> &'static str;

    /// Expansion ratio and character-set constraints, for display.
    fn description(&self) -> &'static str;
}

/// Maps an ordinal 0-63 to its character in the registry alphabet.
///
/// The order is digits, then uppercase, then lowercase, then `-`, then `_`.
/// This deliberately differs from the standard base-64 alphabet; only this
/// crate's own encode/decode pair need agree on it.
pub fn base64_char(index: u8) -> char {
    match index {
        0..=9 => (b'0' + index) as char,
        10..=35 => (b'A' + index - 10) as char,
        36..=61 => (b'a' + index - 36) as char,
        62 => '-',
        _ => '_',
    }
}

/// Maps an alphabet character back to its ordinal, or `None` for any
/// character outside the alphabet.
pub fn base64_index(c: char) -> Option<u8> {
    match c {
        '0'..='9' => Some(c as u8 - b'0'),
        'A'..='Z' => Some(c as u8 - b'A' + 10),
        'a'..='z' => Some(c as u8 - b'a' + 36),
        '-' => Some(62),
        '_' => Some(63),
        _ => None,
    }
}

/// Fixed-size registry of text encoders keyed by alphabet ordinal.
pub struct EncoderRegistry {
    slots: [Option<Box<dyn TextEncoder>>; 64],
}

impl EncoderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }

    /// Registers an encoder under its own id.
    ///
    /// Fails if the id is outside the alphabet or the slot is taken.
    pub fn register(&mut self, encoder: Box<dyn TextEncoder>) -> Result<(), EncodingError> {
        let id = encoder.id();
        let idx = base64_index(id).ok_or(EncodingError::InvalidEncoderId(id))? as usize;

        if self.slots[idx].is_some() {
            return Err(EncodingError::DuplicateEncoderId(id));
        }

        self.slots[idx] = Some(encoder);
        Ok(())
    }

    /// Looks up an encoder by its identifying character.
    pub fn get(&self, id: char) -> Option<&dyn TextEncoder> {
        let idx = base64_index(id)? as usize;
        self.slots[idx].as_deref()
    }

    /// Iterates over registered encoders in alphabet order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn TextEncoder> {
        self.slots.iter().filter_map(|slot| slot.as_deref())
    }
}

impl Default for EncoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_is_a_bijection() {
        for idx in 0..64u8 {
            let c = base64_char(idx);
            assert_eq!(base64_index(c), Some(idx));
        }
    }

    #[test]
    fn test_alphabet_order() {
        assert_eq!(base64_char(0), '0');
        assert_eq!(base64_char(10), 'A');
        assert_eq!(base64_char(36), 'a');
        assert_eq!(base64_char(62), '-');
        assert_eq!(base64_char(63), '_');
    }

    #[test]
    fn test_foreign_characters_have_no_ordinal() {
        assert_eq!(base64_index(' '), None);
        assert_eq!(base64_index('+'), None);
        assert_eq!(base64_index('/'), None);
        assert_eq!(base64_index('é'), None);
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = EncoderRegistry::new();
        registry.register(Box::new(Hex)).unwrap();

        assert!(registry.get('X').is_some());
        assert!(registry.get('U').is_none());
        assert!(registry.get('~').is_none());
    }

    #[test]
    fn test_registry_rejects_duplicate_id() {
        let mut registry = EncoderRegistry::new();
        registry.register(Box::new(Hex)).unwrap();

        let result = registry.register(Box::new(Hex));
        assert!(matches!(result, Err(EncodingError::DuplicateEncoderId('X'))));
    }

    #[test]
    fn test_registry_iterates_in_alphabet_order() {
        let mut registry = EncoderRegistry::new();
        registry.register(Box::new(Base64Url)).unwrap();
        registry.register(Box::new(Cjk4096)).unwrap();
        registry.register(Box::new(Emoji256)).unwrap();
        registry.register(Box::new(Hex)).unwrap();

        let ids: Vec<char> = registry.iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!['C', 'E', 'U', 'X']);
    }
}
