//! ROI - a lossless image codec derived from QOI (the "Quite OK Image"
//! format), with a different opcode set chosen to admit efficient
//! 128-bit-SIMD encoding on little-endian hardware.
//!
//! # Data format
//!
//! A ROI file is a 14-byte header, followed by any number of opcodes, and an
//! 8-byte end marker.
//!
//! ```rust
//! #[repr(C)]
//! struct RoiHeader {
//!     magic: [u8; 4], // magic bytes "roif"
//!     width: u32,     // image width in pixels (BE)
//!     height: u32,    // image height in pixels (BE)
//!     channels: u8,   // 3 = RGB, 4 = RGBA
//!     colorspace: u8, // 0 = sRGB with linear alpha, 1 = all channels linear
//! }
//! ```
//!
//! Images are encoded top to bottom, left to right. Encoder and decoder both
//! start with `{r: 0, g: 0, b: 0, a: 255}` as the previous pixel. Unlike QOI,
//! ROI carries no running index of previously-seen pixels: every opcode other
//! than RUN encodes a diff against the immediately preceding pixel, which is
//! what makes the opcode stream amenable to vectorised per-lane
//! classification (see [`Config`]).
//!
//! All multi-byte opcode payloads are little-endian. Each opcode's tag is
//! carried in the low bits of its first byte:
//!
//! ```text
//! .- LUMA232 ---------------.
//! |         Byte[0]         |
//! |  7  6  5  4  3  2  1  0 |
//! |-----+-----+-------+-----|
//! |  bb |  rr |  ggg  |  0  |
//! `-------------------------`
//! ```
//! 1-bit tag `0`. 3-bit green diff, biased by 4, range `-4..=3`. 2-bit red
//! and blue diffs relative to the green diff, each biased by 2, range
//! `-2..=1`.
//!
//! ```text
//! .- LUMA464 ---------------------------------------.
//! |         Byte[0]         |         Byte[1]       |
//! |  7  6  5  4  3  2  1  0 |  7  6  5  4  3  2  1  0|
//! |------------------+------|-----------+------------|
//! |  green diff (6)  | 0 1  |  blue (4) |   red (4)  |
//! `---------------------------------------------------`
//! ```
//! 2-bit tag `01`. 6-bit green diff biased by 32, range `-32..=31`. 4-bit
//! red/blue diffs relative to green, biased by 8, range `-8..=7`.
//!
//! ```text
//! .- LUMA777 -----------------------------------------------------------.
//! |      Byte[0]      |         Byte[1]        |        Byte[2]         |
//! |------------+-------|----------------+-------|------------------+-----|
//! | green (5lo)| 0 1 1 | red(6lo)|green(2hi)| blue (7)       | red(1hi) |
//! `------------------------------------------------------------------------`
//! ```
//! 3-bit tag `011`. 7-bit green, red and blue diffs (red/blue relative to
//! green), each biased by 64, range `-64..=63`.
//!
//! ```text
//! .- RUN -------------------.
//! |         Byte[0]         |
//! |  7  6  5  4  3  2  1  0 |
//! |-------------+-----------|
//! |     count-1 |  1 1 1    |
//! `-------------------------`
//! ```
//! 3-bit tag `111`. 5-bit run length, biased by 1, range `1..=30`. The
//! values `11110111` and `11111111` are reserved for RGB/RGBA below, so a
//! run of more than 30 pixels is chained as repeated `11101111` bytes
//! (count 30) followed by a shorter final RUN byte.
//!
//! ```text
//! .- RGB -------------------------------------------------.
//! |  Byte[0] | Byte[1] | Byte[2] | Byte[3] |
//! | 11110111 |   vg    |  vg_r   |  vg_b   |
//! `----------------------------------------`
//! ```
//! 8-bit tag `0xF7`. Three *unbiased* signed bytes: the green diff, and the
//! red/blue diffs relative to it.
//!
//! ```text
//! .- RGBA ------------------.
//! |  Byte[0] | Byte[1]      |
//! | 11111111 | new alpha    |
//! `--------------------------`
//! ```
//! 8-bit tag `0xFF`. One byte: the pixel's new alpha value. Always
//! immediately followed by an RGB-family opcode describing the same
//! pixel's RGB diff (computed against the previous pixel's RGB, which the
//! RGBA opcode does not itself update).
//!
//! The byte stream ends with the 8-byte marker `00 00 00 00 00 00 00 01`.
//!
//! # Codepaths
//!
//! [`Config::codepath`] selects between a portable scalar encoder
//! ([`Codepath::Scalar`]) and a 128-bit-SIMD encoder
//! ([`Codepath::Simd`], `x86_64` only, falls back to scalar elsewhere or
//! when the required CPU features are absent at runtime). Both codepaths
//! are required to produce byte-identical output for identical input —
//! `Codepath` is purely a performance knob, never an observable one.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_op_in_unsafe_fn)]

#[cfg(feature = "alloc")]
extern crate alloc;

use core::convert::TryFrom;
use core::fmt;

mod decoder;
mod encoder;
mod format;
mod scalar;
mod simd;

#[cfg(feature = "alloc")]
pub mod container;

pub use decoder::{DecodeProgress, Decoder};
pub use encoder::Encoder;
pub use format::Header;

use snafu::Snafu;

/// Number of color channels carried by the raw pixel buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Channels {
    Rgb = 3,
    Rgba = 4,
}

impl Channels {
    #[inline(always)]
    pub const fn count(self) -> usize {
        self as u8 as usize
    }

    #[inline(always)]
    pub const fn has_alpha(self) -> bool {
        matches!(self, Channels::Rgba)
    }
}

impl TryFrom<u8> for Channels {
    type Error = ();

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            3 => Ok(Channels::Rgb),
            4 => Ok(Channels::Rgba),
            _ => Err(()),
        }
    }
}

/// Informative colorspace tag. ROI never interprets this value; it is
/// carried through the header unchanged, exactly as QOI's own colorspace
/// byte is informative-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Colorspace {
    /// sRGB color channels, linear alpha.
    Srgb = 0,
    /// All channels linear.
    Linear = 1,
}

impl TryFrom<u8> for Colorspace {
    type Error = ();

    #[inline]
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Colorspace::Srgb),
            1 => Ok(Colorspace::Linear),
            // spec.md §9 notes a legacy tolerance for colorspace values 2 and
            // 3 (an older "no-RLE" encoding bit that no current encoder
            // emits). We reject them: nothing in this codebase produces
            // them, and silently accepting a value no encoder here can ever
            // write is more likely to mask a corrupt header than to
            // interoperate with a genuine legacy stream. See DESIGN.md.
            _ => Err(()),
        }
    }
}

/// Image dimensions and pixel layout, independent of how the bytes got
/// there (parsed from a header on decode, or supplied by the caller to
/// drive an encode).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Descriptor {
    pub width: u32,
    pub height: u32,
    pub channels: Channels,
    pub colorspace: Colorspace,
}

impl Descriptor {
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn raw_size(&self) -> usize {
        self.pixel_count() * self.channels.count()
    }
}

/// Selects between the portable scalar kernel and the 128-bit-SIMD kernel.
/// Both must and do produce byte-identical output; this only trades
/// throughput.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codepath {
    Scalar,
    /// Dispatches to the SIMD kernel when the compile target and runtime
    /// CPU support it, otherwise silently falls back to [`Codepath::Scalar`].
    Simd,
}

impl Default for Codepath {
    #[inline]
    fn default() -> Self {
        Codepath::Simd
    }
}

/// Encoder configuration. Presently just the codepath, but kept as its own
/// type (rather than a bare `Codepath` parameter) so future encoder knobs
/// don't become a breaking API change.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub codepath: Codepath,
}

/// Errors that may occur during encoding.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    /// Width or height is zero, or the image exceeds the pixel guard
    /// (`height >= 400_000_000 / width`).
    #[snafu(display("invalid image descriptor"))]
    InvalidDescriptor,

    /// The supplied pixel buffer is smaller than `width * height * channels`.
    #[snafu(display("pixel buffer is too small for the given descriptor"))]
    NotEnoughPixelData,

    /// The output buffer is smaller than [`Descriptor`]'s worst-case encoded
    /// size.
    #[snafu(display("output buffer is too small to hold the encoded image"))]
    OutputTooSmall,
}

/// Errors that may occur during decoding.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("input does not contain a complete 14-byte header"))]
    NotEnoughData,

    #[snafu(display("header magic does not match 'roif'"))]
    InvalidMagic,

    #[snafu(display("header channels byte must be 3 or 4"))]
    InvalidChannels,

    #[snafu(display("header colorspace byte must be 0 or 1"))]
    InvalidColorspace,

    #[snafu(display("header dimensions are zero or exceed the pixel guard"))]
    InvalidDimensions,

    #[snafu(display("requested output channel count must be 0 (header's), 3 or 4"))]
    InvalidRequestedChannels,

    /// The opcode stream ended before `width * height` pixels were produced,
    /// and the caller has indicated no further input is forthcoming.
    #[snafu(display("opcode stream truncated before all pixels were decoded"))]
    Truncated,

    #[snafu(display("output buffer is too small to hold the decoded image"))]
    OutputTooSmall,
}

/// One-shot encode into a caller-supplied buffer. Shorthand for
/// [`Encoder::encode`] with a default [`Config`].
#[inline]
pub fn encode(
    pixels: &[u8],
    descriptor: Descriptor,
    output: &mut [u8],
) -> Result<usize, EncodeError> {
    Encoder::encode(pixels, descriptor, Config::default(), output)
}

/// One-shot encode into a freshly allocated buffer. Shorthand for
/// [`Encoder::encode_alloc`] with a default [`Config`].
#[cfg(feature = "alloc")]
#[inline]
pub fn encode_alloc(
    pixels: &[u8],
    descriptor: Descriptor,
) -> Result<alloc::vec::Vec<u8>, EncodeError> {
    Encoder::encode_alloc(pixels, descriptor, Config::default())
}

/// One-shot decode into a caller-supplied buffer. Shorthand for
/// [`Decoder::decode`].
#[inline]
pub fn decode(
    input: &[u8],
    requested_channels: Channels,
    pixel_output: &mut [u8],
) -> Result<Descriptor, DecodeError> {
    Decoder::decode(input, requested_channels, pixel_output)
}

/// One-shot decode into a freshly allocated buffer. Shorthand for
/// [`Decoder::decode_alloc`].
#[cfg(feature = "alloc")]
#[inline]
pub fn decode_alloc(
    input: &[u8],
    requested_channels: Channels,
) -> Result<(Descriptor, alloc::vec::Vec<u8>), DecodeError> {
    Decoder::decode_alloc(input, requested_channels)
}

impl fmt::Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}
