//! Envelope orchestration.
//!
//! A [`Context`] combines a selected encryptor, optional compression, and a
//! selected text encoder or the image codec into one encode/decode round
//! trip. Every envelope carries a six-character header describing exactly
//! how it was produced, so a decoding context can rebuild the producing
//! configuration without trusting its own current selection:
//!
//! ```text
//! encryption id (2) + encoding id (1) + compression id (1) + flags1 (1) + flags2 (1)
//! ```
//!
//! In the text channel the header and encoded payload sit between two fixed
//! ASCII markers, letting an envelope be fished back out of arbitrary
//! surrounding text. In the image channel the header is six raw bytes in
//! front of the payload, all rendered through the block-grid image codec.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage};
use thiserror::Error;

use crate::crypto::{
    CompressionError, CryptoError, Encryptor, EncryptorRegistry, SharedSecretEncryptor,
    NO_ENCRYPTION,
};
use crate::crypto::{deflate, inflate};
use crate::encoding::{
    base64_char, base64_index, Base64Url, Cjk4096, Emoji256, EncoderRegistry, EncodingError,
    Hex, TextEncoder,
};
use crate::stego;

/// Opens every text-channel envelope.
pub const FRONT_MARKER: &str = "<~`E:";

/// Closes every text-channel envelope.
pub const BACK_MARKER: &str = ":E`~>";

/// Flag bit in `flags1`: payload text bytes are UTF-8 instead of UTF-16LE.
pub const FLAG_UTF8: u8 = 1;

/// Flag bit in `flags1`: the payload is an image's file bytes, not text.
pub const FLAG_IMAGE: u8 = 2;

/// Compression id meaning "no compression".
pub const NO_COMPRESSION: char = '0';

/// Compression id selecting zlib.
pub const ZLIB_COMPRESSION: char = 'z';

/// Characters in an envelope header.
const HEADER_LEN: usize = 6;

/// Errors raised by envelope configuration, encoding, and decoding.
///
/// "No envelope present" is not an error; the decode operations return
/// `Ok(None)` for that.
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("unknown text encoding '{0}'")]
    UnknownEncoding(char),

    #[error("unknown encryption {0:?}")]
    UnknownEncryption(String),

    #[error("unknown compression '{0}'")]
    UnknownCompression(char),

    #[error("flag value {0} does not fit in 6 bits")]
    FlagOutOfRange(u8),

    #[error("palette bit width {0} is outside 1-8")]
    InvalidPaletteBits(u8),

    #[error("image block size must be at least 1")]
    InvalidBlockSize,

    #[error("envelope header too short or malformed")]
    InvalidHeader,

    #[error("found a closing marker with no matching opening marker")]
    UnmatchedMarker,

    #[error("empty payload")]
    EmptyPayload,

    #[error("image error: {0}")]
    Image(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error(transparent)]
    ImageCodec(#[from] stego::ImageCodecError),
}

/// The payload recovered from an envelope.
pub enum Decoded {
    /// A text payload. For the text channel this is the full input with the
    /// envelope replaced by its decoded message.
    Text(String),
    /// An image payload, reconstructed from its embedded file bytes.
    Image(DynamicImage),
}

/// Shared capability registries: text encoders and encryptors.
///
/// A registry is built up front and then frozen behind an [`Arc`]; contexts
/// and their derived sub-contexts hold it by reference, so a decode always
/// sees the same capabilities its parent does.
pub struct Registry {
    encoders: EncoderRegistry,
    encryptors: EncryptorRegistry,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            encoders: EncoderRegistry::new(),
            encryptors: EncryptorRegistry::new(),
        }
    }

    /// Creates a registry with every built-in capability: the four text
    /// encoders and the shared-secret encryptor.
    pub fn standard() -> Result<Self, ContextError> {
        let mut registry = Self::new();

        registry.register_encoder(Box::new(Hex))?;
        registry.register_encoder(Box::new(Base64Url))?;
        registry.register_encoder(Box::new(Cjk4096))?;
        registry.register_encoder(Box::new(Emoji256))?;

        registry.register_encryptor(Box::new(SharedSecretEncryptor::new()))?;

        Ok(registry)
    }

    /// Registers a text encoder under its own id.
    pub fn register_encoder(&mut self, encoder: Box<dyn TextEncoder>) -> Result<(), ContextError> {
        self.encoders.register(encoder)?;
        Ok(())
    }

    /// Registers an encryptor under its own id.
    pub fn register_encryptor(&mut self, encryptor: Box<dyn Encryptor>) -> Result<(), ContextError> {
        self.encryptors.register(encryptor)?;
        Ok(())
    }

    /// Looks up a text encoder.
    pub fn encoder(&self, id: char) -> Option<&dyn TextEncoder> {
        self.encoders.get(id)
    }

    /// Looks up an encryptor.
    pub fn encryptor(&self, id: &str) -> Option<&dyn Encryptor> {
        self.encryptors.get(id)
    }

    /// Iterates over registered text encoders.
    pub fn encoders(&self) -> impl Iterator<Item = &dyn TextEncoder> {
        self.encoders.iter()
    }

    /// Iterates over registered encryptors.
    pub fn encryptors(&self) -> impl Iterator<Item = &dyn Encryptor> {
        self.encryptors.iter()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for one encode or decode operation.
///
/// The registries are shared by reference; everything else is plain data,
/// mutated only through validating setters. Cloning a context (or deriving
/// one from a header) keeps the registries shared, which is what allows an
/// unknown message to be decoded under the exact configuration it was
/// produced with.
#[derive(Clone)]
pub struct Context {
    registry: Arc<Registry>,
    encryption: String,
    encoding: char,
    compression: char,
    flags1: u8,
    flags2: u8,
    block_size: u32,
    palette_bits: u8,
    image_format: ImageFormat,
}

impl Context {
    /// Creates a context with default selections: no encryption, hex
    /// encoding, no compression, UTF-16LE text, 1-pixel blocks with a
    /// 3-bit palette.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            encryption: NO_ENCRYPTION.to_string(),
            encoding: 'X',
            compression: NO_COMPRESSION,
            flags1: 0,
            flags2: 0,
            block_size: 1,
            palette_bits: 3,
            image_format: ImageFormat::Png,
        }
    }

    /// Creates a context over a fresh standard registry.
    pub fn standard() -> Result<Self, ContextError> {
        Ok(Self::new(Arc::new(Registry::standard()?)))
    }

    /// Rebuilds the configuration an envelope was produced under.
    ///
    /// Header-governed fields come from the header; everything else,
    /// including the registries, is inherited from `parent`. Extra
    /// characters after the six header positions are ignored.
    pub fn from_header(header: &str, parent: &Self) -> Result<Self, ContextError> {
        let chars: Vec<char> = header.chars().take(HEADER_LEN).collect();
        if chars.len() < HEADER_LEN {
            return Err(ContextError::InvalidHeader);
        }

        let mut sub = parent.clone();
        sub.set_encryption(&chars[0..2].iter().collect::<String>())?;
        sub.set_encoding(chars[2])?;
        sub.set_compression(chars[3])?;
        sub.flags1 = base64_index(chars[4]).ok_or(ContextError::InvalidHeader)?;
        sub.flags2 = base64_index(chars[5]).ok_or(ContextError::InvalidHeader)?;

        Ok(sub)
    }

    /// The six-character header describing this context's selections.
    pub fn header(&self) -> String {
        self.header_with_flags(self.flags1)
    }

    fn header_with_flags(&self, flags1: u8) -> String {
        let mut out = String::with_capacity(HEADER_LEN);
        out.push_str(&self.encryption);
        out.push(self.encoding);
        out.push(self.compression);
        out.push(base64_char(flags1));
        out.push(base64_char(self.flags2));
        out
    }

    /// Shared capability registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Selects the encryption used for encoding. `"NO"` is always valid.
    pub fn set_encryption(&mut self, id: &str) -> Result<(), ContextError> {
        if id != NO_ENCRYPTION && self.registry.encryptor(id).is_none() {
            return Err(ContextError::UnknownEncryption(id.to_string()));
        }
        self.encryption = id.to_string();
        Ok(())
    }

    /// Selects the text encoding used for encoding.
    pub fn set_encoding(&mut self, id: char) -> Result<(), ContextError> {
        if self.registry.encoder(id).is_none() {
            return Err(ContextError::UnknownEncoding(id));
        }
        self.encoding = id;
        Ok(())
    }

    /// Selects the compression: `'0'` for none, `'z'` for zlib.
    pub fn set_compression(&mut self, id: char) -> Result<(), ContextError> {
        if id != NO_COMPRESSION && id != ZLIB_COMPRESSION {
            return Err(ContextError::UnknownCompression(id));
        }
        self.compression = id;
        Ok(())
    }

    /// Sets the side length of the blocks the image codec renders.
    pub fn set_block_size(&mut self, block_size: u32) -> Result<(), ContextError> {
        if block_size == 0 {
            return Err(ContextError::InvalidBlockSize);
        }
        self.block_size = block_size;
        Ok(())
    }

    /// Sets the palette width for the image codec, in bits per block.
    pub fn set_palette_bits(&mut self, bits: u8) -> Result<(), ContextError> {
        if !(1..=8).contains(&bits) {
            return Err(ContextError::InvalidPaletteBits(bits));
        }
        self.palette_bits = bits;
        Ok(())
    }

    /// Sets the file format used when an image payload is serialized.
    pub fn set_image_format(&mut self, format: ImageFormat) {
        self.image_format = format;
    }

    /// Enables flag bits in the first flag field.
    pub fn set_flag1(&mut self, flags: u8) -> Result<(), ContextError> {
        if flags >= 64 {
            return Err(ContextError::FlagOutOfRange(flags));
        }
        self.flags1 |= flags;
        Ok(())
    }

    /// Toggles flag bits in the first flag field.
    pub fn toggle_flag1(&mut self, flags: u8) -> Result<(), ContextError> {
        if flags >= 64 {
            return Err(ContextError::FlagOutOfRange(flags));
        }
        self.flags1 ^= flags;
        Ok(())
    }

    /// Tests flag bits in the first flag field.
    pub fn flag1(&self, flags: u8) -> bool {
        self.flags1 & flags != 0
    }

    /// Enables flag bits in the second flag field.
    pub fn set_flag2(&mut self, flags: u8) -> Result<(), ContextError> {
        if flags >= 64 {
            return Err(ContextError::FlagOutOfRange(flags));
        }
        self.flags2 |= flags;
        Ok(())
    }

    /// Tests flag bits in the second flag field.
    pub fn flag2(&self, flags: u8) -> bool {
        self.flags2 & flags != 0
    }

    /// Currently selected encryption id.
    pub fn encryption(&self) -> &str {
        &self.encryption
    }

    /// Currently selected encoding id.
    pub fn encoding(&self) -> char {
        self.encoding
    }

    /// Currently selected compression id.
    pub fn compression(&self) -> char {
        self.compression
    }

    // ---- pipeline stages ----

    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        if data.is_empty() {
            return Err(ContextError::EmptyPayload);
        }
        if self.encryption == NO_ENCRYPTION {
            return Ok(data.to_vec());
        }

        let encryptor = self
            .registry
            .encryptor(&self.encryption)
            .ok_or_else(|| ContextError::UnknownEncryption(self.encryption.clone()))?;
        Ok(encryptor.encrypt(data)?)
    }

    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        if data.is_empty() {
            return Err(ContextError::EmptyPayload);
        }
        if self.encryption == NO_ENCRYPTION {
            return Ok(data.to_vec());
        }

        let encryptor = self
            .registry
            .encryptor(&self.encryption)
            .ok_or_else(|| ContextError::UnknownEncryption(self.encryption.clone()))?;
        Ok(encryptor.decrypt(data)?)
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        if data.is_empty() {
            return Err(ContextError::EmptyPayload);
        }
        if self.compression == ZLIB_COMPRESSION {
            return Ok(deflate(data)?);
        }
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        if self.compression == ZLIB_COMPRESSION {
            return Ok(inflate(data)?);
        }
        Ok(data.to_vec())
    }

    fn text_encode(&self, data: &[u8]) -> Result<String, ContextError> {
        let encoder = self
            .registry
            .encoder(self.encoding)
            .ok_or(ContextError::UnknownEncoding(self.encoding))?;
        Ok(encoder.to(data))
    }

    fn text_decode(&self, text: &str) -> Result<Vec<u8>, ContextError> {
        let encoder = self
            .registry
            .encoder(self.encoding)
            .ok_or(ContextError::UnknownEncoding(self.encoding))?;
        Ok(encoder.from(text))
    }

    /// Runs the full byte pipeline and text encoding, without markers.
    pub fn encode_raw_to_text(&self, data: &[u8]) -> Result<String, ContextError> {
        self.text_encode(&self.compress(&self.encrypt(data)?)?)
    }

    /// Reverses [`Context::encode_raw_to_text`].
    pub fn decode_text_to_raw(&self, text: &str) -> Result<Vec<u8>, ContextError> {
        self.decrypt(&self.decompress(&self.text_decode(text)?)?)
    }

    /// Runs the byte pipeline only: encrypt, then compress.
    pub fn encode_raw_to_raw(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        self.compress(&self.encrypt(data)?)
    }

    /// Reverses [`Context::encode_raw_to_raw`].
    pub fn decode_raw_to_raw(&self, data: &[u8]) -> Result<Vec<u8>, ContextError> {
        self.decrypt(&self.decompress(data)?)
    }

    // ---- text <-> bytes ----

    /// Converts payload text to bytes, honoring the UTF-8 flag
    /// (UTF-16LE otherwise).
    pub fn string_to_bytes(&self, text: &str) -> Vec<u8> {
        if self.flag1(FLAG_UTF8) {
            text.as_bytes().to_vec()
        } else {
            text.encode_utf16().flat_map(u16::to_le_bytes).collect()
        }
    }

    /// Converts payload bytes back to text, honoring the UTF-8 flag.
    ///
    /// Invalid sequences are replaced rather than failing; a truncated
    /// trailing code unit is dropped.
    pub fn bytes_to_string(&self, bytes: &[u8]) -> String {
        if self.flag1(FLAG_UTF8) {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
    }

    // ---- envelope operations ----

    /// Encodes text into a marker-delimited text envelope.
    pub fn encode_text_to_text(&self, text: &str) -> Result<String, ContextError> {
        let flags1 = self.flags1 & !FLAG_IMAGE;
        let body = self.encode_raw_to_text(&self.string_to_bytes(text))?;
        Ok(format!(
            "{FRONT_MARKER}{}{body}{BACK_MARKER}",
            self.header_with_flags(flags1)
        ))
    }

    /// Encodes an image's file bytes into a marker-delimited text envelope.
    pub fn encode_image_to_text(&self, image: &DynamicImage) -> Result<String, ContextError> {
        let flags1 = self.flags1 | FLAG_IMAGE;
        let body = self.encode_raw_to_text(&image_to_bytes(image, self.image_format)?)?;
        Ok(format!(
            "{FRONT_MARKER}{}{body}{BACK_MARKER}",
            self.header_with_flags(flags1)
        ))
    }

    /// Encodes text into a block-grid image.
    pub fn encode_text_to_image(&self, text: &str) -> Result<RgbaImage, ContextError> {
        let flags1 = self.flags1 & !FLAG_IMAGE;
        let mut data = self.header_with_flags(flags1).into_bytes();
        data.extend(self.encode_raw_to_raw(&self.string_to_bytes(text))?);

        Ok(stego::encode(
            &data,
            self.block_size,
            &stego::spaced_palette(self.palette_bits),
        )?)
    }

    /// Encodes an image's file bytes into a block-grid image.
    pub fn encode_image_to_image(&self, image: &DynamicImage) -> Result<RgbaImage, ContextError> {
        let flags1 = self.flags1 | FLAG_IMAGE;
        let mut data = self.header_with_flags(flags1).into_bytes();
        data.extend(self.encode_raw_to_raw(&image_to_bytes(image, self.image_format)?)?);

        Ok(stego::encode(
            &data,
            self.block_size,
            &stego::spaced_palette(self.palette_bits),
        )?)
    }

    /// Finds and decodes the last envelope inside arbitrary text.
    ///
    /// Returns `Ok(None)` when no closing marker is present. A closing
    /// marker with no opening marker before it is a malformed envelope and
    /// an error. Text payloads come back spliced into the surrounding
    /// input; image payloads come back as the reconstructed image.
    pub fn decode_text(&self, input: &str) -> Result<Option<Decoded>, ContextError> {
        let Some(back) = input.rfind(BACK_MARKER) else {
            return Ok(None);
        };
        let Some(front) = input[..back].rfind(FRONT_MARKER) else {
            return Err(ContextError::UnmatchedMarker);
        };

        let header_start = front + FRONT_MARKER.len();
        let header_end = header_start + HEADER_LEN;
        if header_end > back {
            return Err(ContextError::InvalidHeader);
        }
        let header = input
            .get(header_start..header_end)
            .ok_or(ContextError::InvalidHeader)?;

        let sub = Context::from_header(header, self)?;
        let raw = sub.decode_text_to_raw(&input[header_end..back])?;

        if sub.flag1(FLAG_IMAGE) {
            return Ok(Some(Decoded::Image(bytes_to_image(&raw)?)));
        }

        let message = sub.bytes_to_string(&raw);
        let prefix = &input[..front];
        let suffix = &input[back + BACK_MARKER.len()..];
        Ok(Some(Decoded::Text(format!("{prefix}{message}{suffix}"))))
    }

    /// Blindly decodes an envelope embedded in an image.
    ///
    /// Returns `Ok(None)` when the image carries no detectable block grid;
    /// most images do not.
    pub fn decode_image(&self, image: &DynamicImage) -> Result<Option<Decoded>, ContextError> {
        let Some(data) = stego::decode(image) else {
            return Ok(None);
        };
        if data.len() < HEADER_LEN + 1 {
            return Ok(None);
        }

        let header =
            std::str::from_utf8(&data[..HEADER_LEN]).map_err(|_| ContextError::InvalidHeader)?;
        let sub = Context::from_header(header, self)?;
        let raw = sub.decode_raw_to_raw(&data[HEADER_LEN..])?;

        if sub.flag1(FLAG_IMAGE) {
            return Ok(Some(Decoded::Image(bytes_to_image(&raw)?)));
        }
        Ok(Some(Decoded::Text(sub.bytes_to_string(&raw))))
    }
}

/// Serializes an image to file bytes in the given format.
pub fn image_to_bytes(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ContextError> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), format)
        .map_err(|e| ContextError::Image(e.to_string()))?;
    Ok(bytes)
}

/// Reconstructs an image from file bytes, sniffing the format.
pub fn bytes_to_image(bytes: &[u8]) -> Result<DynamicImage, ContextError> {
    image::load_from_memory(bytes).map_err(|e| ContextError::Image(e.to_string()))
}
