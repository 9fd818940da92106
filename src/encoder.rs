//! Encoder state and driver (spec.md §4.B, component B).

use crate::format::{self, Header};
use crate::{Channels, Codepath, Config, Descriptor, EncodeError};

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Pixels are fed to the scalar/SIMD kernels in fixed windows rather than
/// all at once. A power of two keeps SIMD windows aligned; its value has
/// no effect on the emitted bytes (spec.md §4.B) - `scalar::tests::
/// windowing_does_not_change_output` and the integration test suite's
/// multi-window images both exercise that claim.
const ENCODE_WINDOW: usize = 131_072;

/// Owns the encoder's running state (spec.md §3 "Encoder state") across
/// however many windows a whole image takes to encode. Most callers want
/// the one-shot [`Encoder::encode`] / [`Encoder::encode_alloc`]; `Encoder`
/// itself is exposed so a caller streaming pixel data in from a file (the
/// "Streaming encode from raw file" driver of spec.md §6, left to
/// `roiconv`) can feed it incrementally without losing run state at
/// buffer boundaries.
pub struct Encoder {
    descriptor: Descriptor,
    config: Config,
    prev: [u8; 4],
    run: u32,
    write_cursor: usize,
    read_cursor: usize,
}

impl Encoder {
    /// Validates `descriptor` and seeds a fresh encoder (`prev_pixel =
    /// (0, 0, 0, 255)`, `run = 0`). The header itself is not written until
    /// [`Encoder::write_header`].
    pub fn new(descriptor: Descriptor, config: Config) -> Result<Self, EncodeError> {
        Header::validate_dims(descriptor.width, descriptor.height)
            .map_err(|_| EncodeError::InvalidDescriptor)?;

        Ok(Encoder {
            descriptor,
            config,
            prev: [0, 0, 0, 255],
            run: 0,
            write_cursor: 0,
            read_cursor: 0,
        })
    }

    /// Worst-case encoded size for an image matching `descriptor`:
    /// `width * height * W + 14 + 8`, `W` = 6 for 4-channel input, 4 for
    /// 3-channel input (spec.md §4.B).
    pub fn encoded_size_limit(descriptor: &Descriptor) -> usize {
        let worst_case_bytes_per_pixel = if descriptor.channels.has_alpha() { 6 } else { 4 };
        descriptor.pixel_count() * worst_case_bytes_per_pixel
            + format::HEADER_SIZE
            + format::PADDING_SIZE
    }

    /// Bytes written to `output` so far, including the header once written.
    pub fn bytes_written(&self) -> usize {
        self.write_cursor
    }

    /// Writes the 14-byte header. Must be called exactly once, before any
    /// call to [`Encoder::encode_window`].
    pub fn write_header(&mut self, output: &mut [u8]) -> Result<(), EncodeError> {
        let header = Header {
            width: self.descriptor.width,
            height: self.descriptor.height,
            channels: self.descriptor.channels,
            colorspace: self.descriptor.colorspace,
        };
        let dst = output
            .get_mut(..format::HEADER_SIZE)
            .ok_or(EncodeError::OutputTooSmall)?;
        dst.copy_from_slice(&header.encode());
        self.write_cursor = format::HEADER_SIZE;
        Ok(())
    }

    /// Encodes one window of raw pixels (a whole number of pixels, not
    /// necessarily a whole image) into `output`, dispatching to the
    /// scalar or SIMD kernel per [`Config::codepath`]. `is_final_chunk`
    /// must be `true` exactly when `pixels` ends at the image's last
    /// pixel (spec.md §4.C step 1).
    pub fn encode_window(
        &mut self,
        pixels: &[u8],
        output: &mut [u8],
        is_final_chunk: bool,
    ) -> Result<usize, EncodeError> {
        let channels = self.descriptor.channels.count();
        if pixels.len() % channels != 0 {
            return Err(EncodeError::NotEnoughPixelData);
        }

        let worst_case = pixels.len() / channels * if channels == 4 { 6 } else { 4 };
        let out = output
            .get_mut(..worst_case)
            .ok_or(EncodeError::OutputTooSmall)?;

        let written = match (self.config.codepath, self.descriptor.channels) {
            (Codepath::Simd, Channels::Rgba) => {
                crate::simd::encode_rgba(pixels, &mut self.prev, &mut self.run, out, is_final_chunk)
            }
            (Codepath::Simd, Channels::Rgb) => {
                crate::simd::encode_rgb(pixels, &mut self.prev, &mut self.run, out, is_final_chunk)
            }
            (Codepath::Scalar, Channels::Rgba) => {
                crate::scalar::encode::<true>(pixels, &mut self.prev, &mut self.run, out, is_final_chunk)
            }
            (Codepath::Scalar, Channels::Rgb) => {
                crate::scalar::encode::<false>(pixels, &mut self.prev, &mut self.run, out, is_final_chunk)
            }
        };

        self.write_cursor += written;
        self.read_cursor += pixels.len();
        Ok(written)
    }

    /// Flushes any pending run and appends the 8-byte end marker. Returns
    /// the total encoded length. Must be called exactly once, after the
    /// image's last pixel has been passed to [`Encoder::encode_window`].
    pub fn finish(&mut self, output: &mut [u8]) -> Result<usize, EncodeError> {
        let dst = output
            .get_mut(self.write_cursor..)
            .ok_or(EncodeError::OutputTooSmall)?;
        self.write_cursor += format::flush_pending_run(&mut self.run, dst);

        let dst = output
            .get_mut(self.write_cursor..self.write_cursor + format::PADDING_SIZE)
            .ok_or(EncodeError::OutputTooSmall)?;
        dst.copy_from_slice(&format::PADDING);
        self.write_cursor += format::PADDING_SIZE;

        Ok(self.write_cursor)
    }

    /// One-shot in-memory encode: validates, writes the header, encodes
    /// `pixels` in fixed windows (spec.md §4.B), and appends the end
    /// marker. `output` must be at least [`Encoder::encoded_size_limit`]
    /// bytes.
    pub fn encode(
        pixels: &[u8],
        descriptor: Descriptor,
        config: Config,
        output: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let mut encoder = Self::new(descriptor, config)?;

        let channels = descriptor.channels.count();
        let total_pixels = descriptor.pixel_count();
        let needed = total_pixels
            .checked_mul(channels)
            .ok_or(EncodeError::NotEnoughPixelData)?;
        let pixels = pixels.get(..needed).ok_or(EncodeError::NotEnoughPixelData)?;

        encoder.write_header(output)?;

        let mut pixel_pos = 0usize;
        while pixel_pos < total_pixels {
            let window = ENCODE_WINDOW.min(total_pixels - pixel_pos);
            let is_final = pixel_pos + window == total_pixels;
            let window_pixels = &pixels[pixel_pos * channels..(pixel_pos + window) * channels];

            let write_cursor = encoder.write_cursor;
            let out = output
                .get_mut(write_cursor..)
                .ok_or(EncodeError::OutputTooSmall)?;
            encoder.encode_window(window_pixels, out, is_final)?;

            pixel_pos += window;
        }

        encoder.finish(output)
    }

    /// [`Encoder::encode`], allocating its own output buffer sized by
    /// [`Encoder::encoded_size_limit`] and truncated to the actual length.
    #[cfg(feature = "alloc")]
    pub fn encode_alloc(
        pixels: &[u8],
        descriptor: Descriptor,
        config: Config,
    ) -> Result<Vec<u8>, EncodeError> {
        let limit = Self::encoded_size_limit(&descriptor);
        let mut output = alloc::vec![0u8; limit];
        let len = Self::encode(pixels, descriptor, config, &mut output)?;
        output.truncate(len);
        Ok(output)
    }
}
