//! Integration tests for Plainsight
//!
//! Cover the full envelope round trips: text and image channels, all four
//! text encoders, compression, shared-secret encryption, and header-driven
//! sub-context reconstruction.
//!
//! "Nothing found" is a valid decode result (Ok(None)), never an error;
//! a failed decrypt of a real envelope is an error, never garbage.

use std::sync::Arc;

use image::{DynamicImage, ImageBuffer, Rgb};

use plainsight::{
    Base64Url, Cjk4096, Context, ContextError, Decoded, Emoji256, Hex, Registry,
    SharedSecretEncryptor, FLAG_UTF8,
};

fn context_with_secret(label: &str, passphrase: &str) -> Context {
    let mut registry = Registry::new();
    registry.register_encoder(Box::new(Hex)).unwrap();
    registry.register_encoder(Box::new(Base64Url)).unwrap();
    registry.register_encoder(Box::new(Cjk4096)).unwrap();
    registry.register_encoder(Box::new(Emoji256)).unwrap();
    registry
        .register_encryptor(Box::new(
            SharedSecretEncryptor::with_secret(label, passphrase).unwrap(),
        ))
        .unwrap();

    Context::new(Arc::new(registry))
}

fn test_image() -> DynamicImage {
    let img = ImageBuffer::from_fn(24, 16, |x, y| {
        Rgb([
            ((x * 31) % 256) as u8,
            ((y * 57) % 256) as u8,
            (((x + y) * 13) % 256) as u8,
        ])
    });
    DynamicImage::ImageRgb8(img)
}

/// The canonical round trip: hex encoding, no encryption, no compression.
#[test]
fn test_hello_world_hex_roundtrip() {
    let context = Context::standard().unwrap();

    let envelope = context.encode_text_to_text("Hello, World!").unwrap();
    assert!(envelope.starts_with("<~`E:"));
    assert!(envelope.ends_with(":E`~>"));

    match context.decode_text(&envelope).unwrap() {
        Some(Decoded::Text(message)) => assert_eq!(message, "Hello, World!"),
        _ => panic!("expected a text payload"),
    }
}

/// Every registered encoder round-trips through the envelope, embedded in
/// surrounding text that must survive the splice.
#[test]
fn test_all_encoders_roundtrip_inside_surrounding_text() {
    for encoding in ['X', 'U', 'C', 'E'] {
        let mut context = Context::standard().unwrap();
        context.set_encoding(encoding).unwrap();

        let message = "Meet me at the usual place at nine.";
        let envelope = context.encode_text_to_text(message).unwrap();
        let surrounded = format!("Dear diary, {envelope} is all I have to say today.");

        match context.decode_text(&surrounded).unwrap() {
            Some(Decoded::Text(out)) => assert_eq!(
                out,
                format!("Dear diary, {message} is all I have to say today."),
                "encoding {encoding}"
            ),
            _ => panic!("expected a text payload for encoding {encoding}"),
        }
    }
}

/// Compression shrinks a repetitive payload and round-trips.
#[test]
fn test_compressed_envelope_roundtrip() {
    let message = "the rain in spain stays mainly in the plain. ".repeat(20);

    let plain_context = Context::standard().unwrap();
    let mut zlib_context = Context::standard().unwrap();
    zlib_context.set_compression('z').unwrap();

    let plain = plain_context.encode_text_to_text(&message).unwrap();
    let compressed = zlib_context.encode_text_to_text(&message).unwrap();
    assert!(compressed.len() < plain.len());

    match zlib_context.decode_text(&compressed).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, message),
        _ => panic!("expected a text payload"),
    }
}

/// Shared-secret encryption round-trips when both sides hold the secret.
#[test]
fn test_encrypted_envelope_roundtrip() {
    let mut context = context_with_secret("pact", "correct horse battery staple");
    context.set_encryption("SS").unwrap();
    context.set_compression('z').unwrap();

    let envelope = context.encode_text_to_text("the eagle lands at midnight").unwrap();

    match context.decode_text(&envelope).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, "the eagle lands at midnight"),
        _ => panic!("expected a text payload"),
    }
}

/// Decrypting with the wrong passphrase is a typed error, not garbage.
#[test]
fn test_wrong_passphrase_is_an_error() {
    let mut sender = context_with_secret("pact", "alpha");
    sender.set_encryption("SS").unwrap();
    let envelope = sender.encode_text_to_text("secret").unwrap();

    let receiver = context_with_secret("pact", "beta");
    let result = receiver.decode_text(&envelope);
    assert!(matches!(result, Err(ContextError::Crypto(_))));
}

/// The header, not the receiving context's selection, governs decoding.
#[test]
fn test_header_drives_sub_context_reconstruction() {
    let mut sender = Context::standard().unwrap();
    sender.set_encoding('C').unwrap();
    sender.set_compression('z').unwrap();
    sender.set_flag1(FLAG_UTF8).unwrap();

    let envelope = sender.encode_text_to_text("配送は明日です").unwrap();

    // Receiver sits on completely different selections.
    let receiver = Context::standard().unwrap();
    assert_eq!(receiver.encoding(), 'X');
    assert_eq!(receiver.compression(), '0');

    match receiver.decode_text(&envelope).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, "配送は明日です"),
        _ => panic!("expected a text payload"),
    }
}

/// Non-ASCII text survives the default UTF-16LE payload representation.
#[test]
fn test_utf16_default_payload_with_non_bmp_text() {
    let context = Context::standard().unwrap();
    let message = "naïve 😀 text";

    let envelope = context.encode_text_to_text(message).unwrap();
    match context.decode_text(&envelope).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, message),
        _ => panic!("expected a text payload"),
    }
}

/// With several envelopes present, the last one is decoded and the others
/// are left untouched in the spliced output.
#[test]
fn test_decode_picks_last_envelope() {
    let context = Context::standard().unwrap();

    let first = context.encode_text_to_text("first").unwrap();
    let second = context.encode_text_to_text("second").unwrap();
    let input = format!("a {first} b {second} c");

    match context.decode_text(&input).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, format!("a {first} b second c")),
        _ => panic!("expected a text payload"),
    }
}

/// Plain text with no markers is "not present", not an error.
#[test]
fn test_plain_text_is_not_present() {
    let context = Context::standard().unwrap();
    assert!(context
        .decode_text("nothing hidden here, move along")
        .unwrap()
        .is_none());
}

/// Text encoded as an image comes back through blind detection.
#[test]
fn test_text_to_image_roundtrip() {
    let mut context = Context::standard().unwrap();
    context.set_block_size(3).unwrap();
    context.set_palette_bits(3).unwrap();

    let image = context.encode_text_to_image("painted into pixels").unwrap();

    match context.decode_image(&DynamicImage::ImageRgba8(image)).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, "painted into pixels"),
        _ => panic!("expected a text payload"),
    }
}

/// An encrypted, compressed image envelope also survives the blind decode.
#[test]
fn test_text_to_image_roundtrip_with_pipeline() {
    let mut context = context_with_secret("pact", "hunter2");
    context.set_encryption("SS").unwrap();
    context.set_compression('z').unwrap();
    context.set_flag1(FLAG_UTF8).unwrap();
    context.set_block_size(2).unwrap();
    context.set_palette_bits(4).unwrap();

    let image = context.encode_text_to_image("buried twice over").unwrap();

    match context.decode_image(&DynamicImage::ImageRgba8(image)).unwrap() {
        Some(Decoded::Text(out)) => assert_eq!(out, "buried twice over"),
        _ => panic!("expected a text payload"),
    }
}

/// An image payload wrapped in a text envelope reconstructs pixel-exact.
#[test]
fn test_image_to_text_roundtrip() {
    let mut context = Context::standard().unwrap();
    context.set_encoding('U').unwrap();

    let original = test_image();
    let envelope = context.encode_image_to_text(&original).unwrap();

    match context.decode_text(&envelope).unwrap() {
        Some(Decoded::Image(out)) => assert_eq!(out.to_rgba8(), original.to_rgba8()),
        _ => panic!("expected an image payload"),
    }
}

/// An image payload inside an image envelope reconstructs pixel-exact.
#[test]
fn test_image_to_image_roundtrip() {
    let mut context = Context::standard().unwrap();
    context.set_compression('z').unwrap();
    context.set_block_size(2).unwrap();

    let original = test_image();
    let encoded = context.encode_image_to_image(&original).unwrap();

    match context.decode_image(&DynamicImage::ImageRgba8(encoded)).unwrap() {
        Some(Decoded::Image(out)) => assert_eq!(out.to_rgba8(), original.to_rgba8()),
        _ => panic!("expected an image payload"),
    }
}

/// An ordinary photo-like image contains no envelope.
#[test]
fn test_ordinary_image_is_not_present() {
    let context = Context::standard().unwrap();

    let uniform = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(80, 60, Rgb([120u8, 80, 40])));
    assert!(context.decode_image(&uniform).unwrap().is_none());
}
