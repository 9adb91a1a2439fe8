//! Base-256 text encoder over emoji.

use super::TextEncoder;

/// One byte per code point across two emoji blocks.
///
/// Byte values 0-79 land in the Emoticons block (`0x1F600..=0x1F64F`);
/// values 80-255 are offset by `0x1F3B0` and land in the Miscellaneous
/// Symbols and Pictographs block (`0x1F400..=0x1F4AF`). The gap between the
/// two sub-ranges is rejected on decode.
pub struct Emoji256;

/// Offset applied to byte values 80-255.
const PICTOGRAPH_OFFSET: u32 = 0x1F3B0;

/// Base of the emoticon sub-range, holding byte values 0-79.
const EMOTICON_BASE: u32 = 0x1F600;

impl TextEncoder for Emoji256 {
    fn to(&self, input: &[u8]) -> String {
        let mut out = String::with_capacity(input.len() * 4);

        for &b in input {
            let value = u32::from(b);
            let code = if value < 80 {
                EMOTICON_BASE + value
            } else {
                PICTOGRAPH_OFFSET + value
            };
            out.push(char::from_u32(code).expect("emoji ranges contain no surrogates"));
        }

        out
    }

    fn from(&self, input: &str) -> Vec<u8> {
        let mut out = Vec::new();

        for c in input.chars() {
            let code = c as u32;

            if (0x1F400..=0x1F64F).contains(&code) {
                if code >= EMOTICON_BASE {
                    out.push((code - EMOTICON_BASE) as u8);
                } else if code <= 0x1F4AF {
                    out.push((code - PICTOGRAPH_OFFSET) as u8);
                }
                // Code points between the two sub-ranges carry no data.
            }
        }

        out
    }

    fn id(&self) -> char {
        'E'
    }

    fn name(&self) -> &'static str {
        "Emoji 256"
    }

    fn description(&self) -> &'static str {
        "Base 256 over the 0x1F400-0x1F4AF and 0x1F600-0x1F64F emoji blocks, \
         one code point per byte. Output is one character per input byte but \
         four bytes per character in UTF-8 or UTF-16. Requires an environment \
         that accepts code points beyond the Basic Multilingual Plane."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_byte_values() {
        assert_eq!(Emoji256.to(&[0]), "\u{1F600}");
        assert_eq!(Emoji256.to(&[79]), "\u{1F64F}");
        assert_eq!(Emoji256.to(&[80]), "\u{1F400}");
        assert_eq!(Emoji256.to(&[255]), "\u{1F4AF}");
    }

    #[test]
    fn test_roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255).collect();
        assert_eq!(Emoji256.from(&Emoji256.to(&data)), data);
    }

    #[test]
    fn test_decode_rejects_gap_code_points() {
        // 0x1F4B0..=0x1F5FF sits between the two sub-ranges.
        let noisy = format!("\u{1F600}\u{1F4B0}\u{1F5FF}\u{1F400}");
        assert_eq!(Emoji256.from(&noisy), vec![0, 80]);
    }

    #[test]
    fn test_decode_skips_foreign_characters() {
        let data = [0, 42, 99, 200];
        let encoded = Emoji256.to(&data);
        let noisy: String = encoded.chars().flat_map(|c| [c, ' ', 'x']).collect();
        assert_eq!(Emoji256.from(&noisy), data);
    }

    #[test]
    fn test_empty() {
        assert_eq!(Emoji256.to(&[]), "");
        assert_eq!(Emoji256.from(""), Vec::<u8>::new());
    }
}
