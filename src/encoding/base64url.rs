//! URL-safe base-64 text encoder.

use super::{base64_char, base64_index, TextEncoder};
use crate::bits::{get_bits, set_bits};

/// Encodes the bit stream in consecutive 6-bit windows using the registry
/// alphabet (digits, uppercase, lowercase, `-`, `_`).
///
/// The character ordering deliberately differs from RFC 4648, so output is
/// not interchangeable with standard base-64 decoders; only this pair of
/// `to`/`from` needs to agree. The final window may be shorter than 6 bits
/// and carries the remaining bits in its low positions.
pub struct Base64Url;

impl TextEncoder for Base64Url {
    fn to(&self, input: &[u8]) -> String {
        let total_bits = input.len() as u64 * 8;
        let mut out = String::with_capacity((input.len() * 8 + 5) / 6);

        let mut x = 0u64;
        while x < total_bits {
            let width = 6.min((total_bits - x) as u32);
            out.push(base64_char(get_bits(input, x, width) as u8));
            x += 6;
        }

        out
    }

    fn from(&self, input: &str) -> Vec<u8> {
        let mut chars: Vec<char> = input.chars().collect();

        // Trim trailing characters outside the alphabet before sizing the
        // output; mid-stream foreign characters shrink it afterwards.
        while matches!(chars.last(), Some(&c) if base64_index(c).is_none()) {
            chars.pop();
        }

        let out_len = chars.len() * 6 / 8;
        let total_bits = out_len as u64 * 8;
        let mut out = vec![0u8; out_len];

        let mut x = 0u64;
        for (i, &c) in chars.iter().enumerate() {
            if x >= total_bits {
                break;
            }

            let Some(value) = base64_index(c) else {
                continue;
            };

            // The last input character only fills whatever is left of the
            // current output byte; encode put the remainder in its low bits.
            let width = if i + 1 < chars.len() {
                6
            } else {
                8 - (x % 8) as u32
            };

            set_bits(&mut out, x, width, u64::from(value));
            x += 6;
        }

        // Skipped characters mean fewer bits than the sizing assumed.
        if x < total_bits {
            out.truncate((x / 8) as usize);
        }

        out
    }

    fn id(&self) -> char {
        'U'
    }

    fn name(&self) -> &'static str {
        "URL 64"
    }

    fn description(&self) -> &'static str {
        "Base 64 using digits, both letter cases, '-' and '_'. Output is \
         roughly 1.34 times the size of the input bytes. Pure ASCII and safe \
         inside URLs; note the alphabet ordering is this tool's own, so the \
         text is not decodable by standard base-64 tooling."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_lengths() {
        for len in 0..32 {
            let data: Vec<u8> = (0..len).map(|i| (i * 37 + 11) as u8).collect();
            assert_eq!(Base64Url.from(&Base64Url.to(&data)), data, "len {len}");
        }
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(Base64Url.from(&Base64Url.to(&data)), data);
    }

    #[test]
    fn test_encode_uses_own_alphabet() {
        // 0x00 0x10 0x83 is windows 0, 1, 2, 3.
        assert_eq!(Base64Url.to(&[0x00, 0x10, 0x83]), "0123");
    }

    #[test]
    fn test_decode_skips_injected_characters() {
        let data = b"The quick brown fox";
        let encoded = Base64Url.to(data);

        let mut noisy = String::new();
        for (i, c) in encoded.chars().enumerate() {
            noisy.push(c);
            if i % 3 == 0 {
                noisy.push(' ');
            }
            if i % 7 == 0 {
                noisy.push('+');
            }
        }

        assert_eq!(Base64Url.from(&noisy), data);
    }

    #[test]
    fn test_decode_trims_trailing_garbage() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        let encoded = Base64Url.to(&data);
        assert_eq!(Base64Url.from(&format!("{encoded} \n.!?")), data);
    }

    #[test]
    fn test_decode_empty_and_pure_garbage() {
        assert_eq!(Base64Url.from(""), Vec::<u8>::new());
        assert_eq!(Base64Url.from("  ?!  "), Vec::<u8>::new());
    }
}
