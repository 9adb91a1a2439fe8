//! Base-4096 text encoder over CJK ideographs.

use super::TextEncoder;
use crate::bits::{get_bits, set_bits};

/// First code point of the normal 12-bit range (`0x3400..=0x43FF`).
const NORMAL_BASE: u32 = 0x3400;

/// First code point of the 4-bit short range (`0x4400..=0x440F`), used for a
/// half-byte remainder at the end of the stream.
const SHORT_BASE: u32 = 0x4400;

/// Last code point accepted by the decoder.
const RANGE_END: u32 = 0x440F;

/// Packs 3 bytes into two 12-bit code points from the CJK Unified
/// Ideographs Extension A block.
///
/// A trailing single byte becomes one code point carrying the byte in its
/// high 8 bits. A trailing byte pair becomes one normal code point plus one
/// short-range code point carrying the remaining 4 bits; the short range is
/// disjoint from the normal range so the decoder can tell the two apart.
pub struct Cjk4096;

impl TextEncoder for Cjk4096 {
    fn to(&self, input: &[u8]) -> String {
        let len = input.len();
        let mut out = String::with_capacity((len / 3 + 1) * 2);

        let mut x = 0;
        while x < len {
            let bit = (x * 8) as u64;

            if x + 1 >= len {
                // Lone final byte, left-aligned in a 12-bit code.
                out.push(cjk_char(get_bits(input, bit, 8) as u32 * 16 + NORMAL_BASE));
            } else {
                out.push(cjk_char(get_bits(input, bit, 12) as u32 + NORMAL_BASE));

                if x + 2 >= len {
                    // Half-byte remainder, flagged via the short range.
                    out.push(cjk_char(get_bits(input, bit + 12, 4) as u32 + SHORT_BASE));
                } else {
                    out.push(cjk_char(get_bits(input, bit + 12, 12) as u32 + NORMAL_BASE));
                }
            }

            x += 3;
        }

        out
    }

    fn from(&self, input: &str) -> Vec<u8> {
        let mut chars: Vec<char> = input.chars().collect();

        while matches!(chars.last(), Some(&c) if !in_range(c)) {
            chars.pop();
        }

        let mut out = vec![0u8; (chars.len() / 2) * 3 + 3];
        let mut bytepos = 0usize;
        let mut first: u32 = 0;

        for (i, &c) in chars.iter().enumerate() {
            let code = c as u32;
            if !(NORMAL_BASE..=RANGE_END).contains(&code) {
                continue;
            }

            let is_last = i + 1 == chars.len();

            // A short-range code is only meaningful as the closing half of a
            // trailing pair; anywhere else it is stray and skipped.
            if code >= SHORT_BASE && (first == 0 || !is_last) {
                continue;
            }

            if first == 0 {
                first = code;

                if is_last {
                    // Lone final code point carries a single byte.
                    out[bytepos] = ((first - NORMAL_BASE) / 16) as u8;
                    bytepos += 1;
                }
            } else {
                set_bits(&mut out, (bytepos * 8) as u64, 12, u64::from(first - NORMAL_BASE));
                bytepos += 1;

                if code >= SHORT_BASE {
                    set_bits(&mut out, (bytepos * 8 + 4) as u64, 4, u64::from(code - SHORT_BASE));
                    bytepos += 1;
                } else {
                    set_bits(&mut out, (bytepos * 8 + 4) as u64, 12, u64::from(code - NORMAL_BASE));
                    bytepos += 2;
                    first = 0;
                }
            }
        }

        out.truncate(bytepos);
        out
    }

    fn id(&self) -> char {
        'C'
    }

    fn name(&self) -> &'static str {
        "CJK 4096"
    }

    fn description(&self) -> &'static str {
        "Base 4096 over the 0x3400-0x440F code points of the CJK Unified \
         Ideographs Extension A block. Output is roughly 0.67 characters per \
         input byte, the densest of the text encoders. All code points are on \
         the Basic Multilingual Plane, but an ASCII-only environment will \
         reject them."
    }
}

fn in_range(c: char) -> bool {
    (NORMAL_BASE..=RANGE_END).contains(&(c as u32))
}

fn cjk_char(code: u32) -> char {
    debug_assert!((NORMAL_BASE..=RANGE_END).contains(&code));
    char::from_u32(code).expect("CJK range contains no surrogates")
}
