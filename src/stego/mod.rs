//! Steganographic image codec.
//!
//! Renders byte buffers as grids of flat-color blocks and blindly recovers
//! them from raw pixel data, with no side channel for block size or palette.

pub mod image;

pub use image::{
    color_distance, decode, encode, nearest_palette_index, spaced_palette, ImageCodecError,
};
