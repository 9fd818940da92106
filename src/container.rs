//! Minimal raw, maxval-255 PPM (P6) and PAM (P7) readers/writers (spec.md
//! §6's "external collaborators"). These are thin front ends over
//! [`crate::Encoder`]/[`crate::Decoder`] — pixel bytes pass through
//! unchanged, nothing here touches the wire format. Only what `roiconv`
//! needs: 8-bit RGB/RGBA, raw sample data, no textual comments inside the
//! pixel body.

use alloc::vec::Vec;
use core::str::FromStr;

use snafu::Snafu;

use crate::{Channels, Colorspace, Descriptor};

/// Errors from parsing or writing a PPM/PAM container. Kept separate from
/// [`crate::DecodeError`]/[`crate::EncodeError`] — a malformed container
/// header has nothing to do with the ROI wire format it wraps.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ContainerError {
    #[snafu(display("input is too short to contain a container header"))]
    Truncated,

    #[snafu(display("unrecognised magic bytes, expected P6 or P7"))]
    UnknownMagic,

    #[snafu(display("container header field is not valid ASCII/UTF-8"))]
    MalformedHeader,

    #[snafu(display("container declares a maxval other than 255"))]
    UnsupportedMaxval,

    #[snafu(display("PAM header is missing a required field"))]
    MissingField,

    #[snafu(display("PAM TUPLTYPE must be RGB or RGB_ALPHA"))]
    UnsupportedTupleType,

    #[snafu(display("pixel body is shorter than width * height * channels"))]
    ShortBody,
}

/// Parses a raw P6 PPM: `P6\n<width> <height>\n255\n` followed by
/// `width * height * 3` bytes of RGB data. No support for comments or a
/// maxval other than 255 (spec.md §6 only specifies raw, 8-bit PPM).
pub fn read_ppm(input: &[u8]) -> Result<(Descriptor, Vec<u8>), ContainerError> {
    let mut tokens = HeaderTokens::new(input);

    let magic = tokens.next_token().ok_or(ContainerError::Truncated)?;
    if magic != b"P6" {
        return Err(ContainerError::UnknownMagic);
    }

    let width = tokens.next_uint()?;
    let height = tokens.next_uint()?;
    let maxval = tokens.next_uint()?;
    if maxval != 255 {
        return Err(ContainerError::UnsupportedMaxval);
    }

    let body = tokens.remaining();
    let needed = width as usize * height as usize * 3;
    if body.len() < needed {
        log::warn!("PPM body is shorter than the declared dimensions imply");
        return Err(ContainerError::ShortBody);
    }

    let descriptor = Descriptor {
        width,
        height,
        channels: Channels::Rgb,
        colorspace: Colorspace::Srgb,
    };
    log::debug!("read_ppm: {}x{} RGB", width, height);
    Ok((descriptor, body[..needed].to_vec()))
}

/// Writes `pixels` (RGB, `descriptor.width * descriptor.height * 3`
/// bytes) as a raw P6 PPM.
pub fn write_ppm(descriptor: &Descriptor, pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + pixels.len());
    write_decimal_header(&mut out, b"P6", &[descriptor.width, descriptor.height, 255]);
    out.extend_from_slice(pixels);
    out
}

/// Parses a raw, single-image P7 PAM with `TUPLTYPE RGB` or
/// `RGB_ALPHA` and `MAXVAL 255`.
pub fn read_pam(input: &[u8]) -> Result<(Descriptor, Vec<u8>), ContainerError> {
    let mut lines = input.split(|&b| b == b'\n');

    let magic = lines.next().ok_or(ContainerError::Truncated)?;
    if magic != b"P7" {
        return Err(ContainerError::UnknownMagic);
    }

    let mut width = None;
    let mut height = None;
    let mut depth = None;
    let mut maxval = None;
    let mut tupltype: Option<Channels> = None;
    let mut header_len = magic.len() + 1;

    for line in lines {
        header_len += line.len() + 1;
        let text = core::str::from_utf8(line).map_err(|_| ContainerError::MalformedHeader)?;
        let text = text.trim();
        if text == "ENDHDR" {
            break;
        }
        let mut parts = text.splitn(2, ' ');
        let key = parts.next().unwrap_or("");
        let value = parts.next().unwrap_or("").trim();
        match key {
            "WIDTH" => width = Some(parse_u32(value)?),
            "HEIGHT" => height = Some(parse_u32(value)?),
            "DEPTH" => depth = Some(parse_u32(value)?),
            "MAXVAL" => maxval = Some(parse_u32(value)?),
            "TUPLTYPE" => {
                tupltype = Some(match value {
                    "RGB" => Channels::Rgb,
                    "RGB_ALPHA" => Channels::Rgba,
                    _ => return Err(ContainerError::UnsupportedTupleType),
                });
            }
            "" => {}
            other => log::warn!("ignoring unrecognised PAM header field {other:?}"),
        }
    }

    let width = width.ok_or(ContainerError::MissingField)?;
    let height = height.ok_or(ContainerError::MissingField)?;
    let depth = depth.ok_or(ContainerError::MissingField)?;
    let channels = tupltype.ok_or(ContainerError::MissingField)?;
    if maxval != Some(255) {
        return Err(ContainerError::UnsupportedMaxval);
    }
    if depth as usize != channels.count() {
        return Err(ContainerError::UnsupportedTupleType);
    }

    let body = input.get(header_len..).unwrap_or(&[]);
    let needed = width as usize * height as usize * channels.count();
    if body.len() < needed {
        log::warn!("PAM body is shorter than the declared dimensions imply");
        return Err(ContainerError::ShortBody);
    }

    let descriptor = Descriptor { width, height, channels, colorspace: Colorspace::Srgb };
    log::debug!("read_pam: {}x{} {:?}", width, height, channels);
    Ok((descriptor, body[..needed].to_vec()))
}

/// Writes `pixels` as a raw P7 PAM matching `descriptor.channels`.
pub fn write_pam(descriptor: &Descriptor, pixels: &[u8]) -> Vec<u8> {
    let tupltype: &[u8] = if descriptor.channels.has_alpha() { b"RGB_ALPHA" } else { b"RGB" };
    let mut out = Vec::with_capacity(96 + pixels.len());
    out.extend_from_slice(b"P7\n");
    write_field(&mut out, b"WIDTH", descriptor.width);
    write_field(&mut out, b"HEIGHT", descriptor.height);
    write_field(&mut out, b"DEPTH", descriptor.channels.count() as u32);
    write_field(&mut out, b"MAXVAL", 255);
    out.extend_from_slice(b"TUPLTYPE ");
    out.extend_from_slice(tupltype);
    out.push(b'\n');
    out.extend_from_slice(b"ENDHDR\n");
    out.extend_from_slice(pixels);
    out
}

fn write_field(out: &mut Vec<u8>, key: &[u8], value: u32) {
    out.extend_from_slice(key);
    out.push(b' ');
    write_decimal(out, value);
    out.push(b'\n');
}

fn write_decimal_header(out: &mut Vec<u8>, magic: &[u8], fields: &[u32]) {
    out.extend_from_slice(magic);
    out.push(b'\n');
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(b' ');
        }
        write_decimal(out, *field);
    }
    out.push(b'\n');
}

fn write_decimal(out: &mut Vec<u8>, mut value: u32) {
    let start = out.len();
    if value == 0 {
        out.push(b'0');
        return;
    }
    while value > 0 {
        out.push(b'0' + (value % 10) as u8);
        value /= 10;
    }
    out[start..].reverse();
}

fn parse_u32(s: &str) -> Result<u32, ContainerError> {
    u32::from_str(s).map_err(|_| ContainerError::MalformedHeader)
}

/// Whitespace-delimited token scanner over a PPM header (`P6`, width,
/// height, maxval), stopping after the fourth token and exposing
/// whatever bytes remain as the pixel body.
struct HeaderTokens<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> HeaderTokens<'a> {
    fn new(input: &'a [u8]) -> Self {
        HeaderTokens { input, pos: 0 }
    }

    fn next_token(&mut self) -> Option<&'a [u8]> {
        while self.input.get(self.pos).map_or(false, u8::is_ascii_whitespace) {
            self.pos += 1;
        }
        let start = self.pos;
        while self.input.get(self.pos).map_or(false, |b| !b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        let token = &self.input[start..self.pos];
        // Consume exactly one trailing whitespace byte so the pixel body
        // (which follows the maxval token's newline) isn't shifted.
        if self.input.get(self.pos).map_or(false, u8::is_ascii_whitespace) {
            self.pos += 1;
        }
        Some(token)
    }

    fn next_uint(&mut self) -> Result<u32, ContainerError> {
        let token = self.next_token().ok_or(ContainerError::Truncated)?;
        let text = core::str::from_utf8(token).map_err(|_| ContainerError::MalformedHeader)?;
        parse_u32(text)
    }

    fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }
}
