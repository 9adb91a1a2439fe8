//! # Plainsight - hide data in plain sight
//!
//! Plainsight turns arbitrary bytes into alternate textual or visual
//! representations and back, with optional compression and encryption
//! layered underneath. The result is framed so it can be recovered from
//! inside arbitrary surrounding text, or rediscovered inside an image with
//! no side channel at all.
//!
//! ## Overview
//!
//! - Text is converted to bytes, optionally encrypted and compressed, then
//!   rendered through one of four **text encoders** (hex, URL-safe base-64,
//!   a CJK base-4096 scheme, an emoji base-256 scheme) or through the
//!   **image codec**, which paints the bytes as a grid of flat-color blocks.
//! - A six-character **header** travels with every envelope, so decoding
//!   rebuilds the exact configuration the message was produced under.
//! - In the text channel the envelope sits between two fixed markers and can
//!   be fished out of any amount of unrelated text. In the image channel the
//!   decoder rediscovers the block size and color palette from the pixels
//!   alone, gated by a magic constant.
//! - Decoding tolerates hostile surroundings: text encoders skip characters
//!   that are not theirs, and "no message here" is a result, not an error.
//!
//! ## Example Usage
//!
//! ```rust
//! use plainsight::{Context, Decoded};
//!
//! let context = Context::standard().unwrap();
//!
//! // Encode a message into a marker-delimited hex envelope.
//! let envelope = context.encode_text_to_text("Hello, World!").unwrap();
//!
//! // The envelope survives being pasted into other text.
//! let surrounded = format!("as discussed: {envelope} -- thanks!");
//!
//! match context.decode_text(&surrounded).unwrap() {
//!     Some(Decoded::Text(message)) => {
//!         assert_eq!(message, "as discussed: Hello, World! -- thanks!");
//!     }
//!     _ => panic!("envelope not found"),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`bits`]: bit-window reads and writes over byte buffers
//! - [`encoding`]: the four text encoders and their registry
//! - [`stego`]: the block-grid image codec with blind detection
//! - [`crypto`]: the encryptor capability, shared-secret encryption, and
//!   payload compression
//! - [`context`]: envelope orchestration tying it all together

pub mod bits;
pub mod context;
pub mod crypto;
pub mod encoding;
pub mod stego;

// Re-export commonly used types at the crate root
pub use context::{
    bytes_to_image, image_to_bytes, Context, ContextError, Decoded, Registry, BACK_MARKER,
    FLAG_IMAGE, FLAG_UTF8, FRONT_MARKER, NO_COMPRESSION, ZLIB_COMPRESSION,
};
pub use crypto::{
    CompressionError, CryptoError, Encryptor, EncryptorRegistry, SharedSecretEncryptor,
    NO_ENCRYPTION,
};
pub use encoding::{
    base64_char, base64_index, Base64Url, Cjk4096, Emoji256, EncoderRegistry, EncodingError, Hex,
    TextEncoder,
};
pub use stego::ImageCodecError;
