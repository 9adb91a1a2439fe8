//! Plainsight - hide data in plain sight
//!
//! CLI for encoding messages and images into recoverable text or image
//! envelopes, with optional compression and shared-secret encryption.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use plainsight::{
    Base64Url, Cjk4096, Context, Decoded, Emoji256, Hex, Registry, SharedSecretEncryptor,
    FLAG_UTF8,
};

/// Plainsight - hide data in plain sight
///
/// Encodes text or images into alternate representations (hex, base-64,
/// CJK ideographs, emoji, or a block-grid image) that can be recovered from
/// inside arbitrary surrounding text or from raw pixels.
#[derive(Parser)]
#[command(name = "plainsight")]
#[command(version = "0.3.0")]
#[command(about = "Hide data in plain sight: text and image envelopes with compression and encryption")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message or an image into an envelope
    ///
    /// The payload is a text message (argument or stdin) or an image file
    /// (--input-image). The envelope is text on stdout by default, or a
    /// block-grid PNG with --to-image.
    Encode {
        /// Text message to encode; read from stdin when absent
        message: Option<String>,

        /// Encode this image file instead of a text message
        #[arg(long, conflicts_with = "message")]
        input_image: Option<PathBuf>,

        /// Text encoding id: X (hex), U (base-64), C (CJK), E (emoji)
        #[arg(short, long, default_value = "X")]
        encoding: char,

        /// Compress the payload with zlib before encoding
        #[arg(short = 'z', long)]
        compress: bool,

        /// Encrypt with a shared secret derived from this passphrase
        #[arg(short, long)]
        secret: Option<String>,

        /// Label identifying the shared secret (both sides must agree)
        #[arg(long, default_value = "DEFAULT")]
        label: String,

        /// Store text payloads as UTF-8 instead of UTF-16LE
        #[arg(long)]
        utf8: bool,

        /// Render the envelope as a block-grid image at this path
        #[arg(long)]
        to_image: Option<PathBuf>,

        /// Side length of the image blocks, in pixels
        #[arg(long, default_value = "4")]
        block_size: u32,

        /// Palette width of the image blocks, in bits (1-8)
        #[arg(long, default_value = "3")]
        palette_bits: u8,

        /// Show the header and payload sizes on stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Decode an envelope found in text or in an image
    ///
    /// Text is searched for the last marker-delimited envelope; images are
    /// scanned blindly for an embedded block grid. Finding nothing is a
    /// normal outcome, not an error.
    Decode {
        /// Text to search; read from stdin when absent
        input: Option<String>,

        /// Read the text to search from a file
        #[arg(long, conflicts_with = "input")]
        file: Option<PathBuf>,

        /// Scan this image file instead of text
        #[arg(long, conflicts_with_all = ["input", "file"])]
        image: Option<PathBuf>,

        /// Where to write a decoded image payload (PNG)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Passphrase for the shared secret, if the envelope is encrypted
        #[arg(short, long)]
        secret: Option<String>,

        /// Label identifying the shared secret
        #[arg(long, default_value = "DEFAULT")]
        label: String,

        /// Show the recovered header on stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// List the available text encoders and encryptors
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            message,
            input_image,
            encoding,
            compress,
            secret,
            label,
            utf8,
            to_image,
            block_size,
            palette_bits,
            verbose,
        } => {
            let mut context = build_context(secret.as_deref(), &label)?;
            context.set_encoding(encoding)?;
            if compress {
                context.set_compression('z')?;
            }
            if secret.is_some() {
                context.set_encryption("SS")?;
            }
            if utf8 {
                context.set_flag1(FLAG_UTF8)?;
            }
            context.set_block_size(block_size)?;
            context.set_palette_bits(palette_bits)?;

            if verbose {
                eprintln!("Header: {}", context.header());
            }

            match input_image {
                Some(path) => {
                    let img = image::open(&path)
                        .with_context(|| format!("failed to open image {}", path.display()))?;

                    match to_image {
                        Some(out) => {
                            let encoded = context.encode_image_to_image(&img)?;
                            encoded
                                .save(&out)
                                .with_context(|| format!("failed to save {}", out.display()))?;
                            eprintln!("Wrote {}", out.display());
                        }
                        None => println!("{}", context.encode_image_to_text(&img)?),
                    }
                }
                None => {
                    let message = match message {
                        Some(m) => m,
                        None => read_stdin()?,
                    };

                    if verbose {
                        eprintln!("Payload: {} characters", message.chars().count());
                    }

                    match to_image {
                        Some(out) => {
                            let encoded = context.encode_text_to_image(&message)?;
                            encoded
                                .save(&out)
                                .with_context(|| format!("failed to save {}", out.display()))?;
                            eprintln!("Wrote {}", out.display());
                        }
                        None => println!("{}", context.encode_text_to_text(&message)?),
                    }
                }
            }
        }

        Commands::Decode {
            input,
            file,
            image,
            output,
            secret,
            label,
            verbose,
        } => {
            let context = build_context(secret.as_deref(), &label)?;

            let decoded = match image {
                Some(path) => {
                    let img = image::open(&path)
                        .with_context(|| format!("failed to open image {}", path.display()))?;
                    context.decode_image(&img)?
                }
                None => {
                    let text = match (input, file) {
                        (Some(text), _) => text,
                        (None, Some(path)) => std::fs::read_to_string(&path)
                            .with_context(|| format!("failed to read {}", path.display()))?,
                        (None, None) => read_stdin()?,
                    };
                    context.decode_text(&text)?
                }
            };

            match decoded {
                Some(Decoded::Text(message)) => println!("{message}"),
                Some(Decoded::Image(img)) => {
                    let out = output.unwrap_or_else(|| PathBuf::from("decoded.png"));
                    img.save(&out)
                        .with_context(|| format!("failed to save {}", out.display()))?;
                    eprintln!("Wrote {}", out.display());
                }
                None => {
                    if verbose {
                        eprintln!("No markers or block grid detected");
                    }
                    println!("No hidden message found.");
                }
            }
        }

        Commands::List => {
            let context = Context::standard()?;

            println!("Text encoders:");
            for encoder in context.registry().encoders() {
                println!("  {}  {}", encoder.id(), encoder.name());
                println!("       {}", encoder.description());
            }

            println!();
            println!("Encryptors:");
            println!("  NO  No Encryption");
            println!("       Payload passes through unchanged.");
            for encryptor in context.registry().encryptors() {
                println!("  {}  {}", encryptor.id(), encryptor.name());
                println!("       {}", encryptor.description());
            }
        }
    }

    Ok(())
}

/// Builds a context whose shared-secret encryptor holds the given
/// passphrase, or the standard context when no passphrase is given.
fn build_context(secret: Option<&str>, label: &str) -> Result<Context> {
    let encryptor = match secret {
        Some(passphrase) => SharedSecretEncryptor::with_secret(label, passphrase)?,
        None => SharedSecretEncryptor::new(),
    };

    let mut registry = Registry::new();
    registry.register_encoder(Box::new(Hex))?;
    registry.register_encoder(Box::new(Base64Url))?;
    registry.register_encoder(Box::new(Cjk4096))?;
    registry.register_encoder(Box::new(Emoji256))?;
    registry.register_encryptor(Box::new(encryptor))?;

    Ok(Context::new(Arc::new(registry)))
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .context("failed to read stdin")?;
    Ok(buffer.trim_end_matches('\n').to_string())
}
