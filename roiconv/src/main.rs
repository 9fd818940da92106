use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use roi::{container, Channels, Codepath, Config, Descriptor, Encoder, Header};

/// Converts between raw PPM/PAM images and the ROI codec.
#[derive(Parser)]
#[command(name = "roiconv", about = "Convert between PPM/PAM and ROI images")]
struct Args {
    /// Input path; format is picked from its extension (ppm, pam, roi).
    input: PathBuf,
    /// Output path; format is picked from its extension (ppm, pam, roi, raw).
    output: PathBuf,
    /// Encoder codepath to use when writing a ROI file.
    #[arg(long, value_enum, default_value_t = CodepathArg::Simd)]
    codepath: CodepathArg,
    /// Channel count to decode a ROI input into; defaults to the header's.
    #[arg(long, value_enum)]
    channels: Option<ChannelsArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodepathArg {
    Scalar,
    Simd,
}

impl From<CodepathArg> for Codepath {
    fn from(arg: CodepathArg) -> Codepath {
        match arg {
            CodepathArg::Scalar => Codepath::Scalar,
            CodepathArg::Simd => Codepath::Simd,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelsArg {
    Rgb,
    Rgba,
}

impl From<ChannelsArg> for Channels {
    fn from(arg: ChannelsArg) -> Channels {
        match arg {
            ChannelsArg::Rgb => Channels::Rgb,
            ChannelsArg::Rgba => Channels::Rgba,
        }
    }
}

enum Format {
    Ppm,
    Pam,
    Roi,
    Raw,
}

fn format_of(path: &Path) -> Result<Format, String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ppm") => Ok(Format::Ppm),
        Some("pam") => Ok(Format::Pam),
        Some("roi") => Ok(Format::Roi),
        Some("raw") => Ok(Format::Raw),
        other => Err(format!("cannot pick a format from extension {:?}", other)),
    }
}

/// Drops or synthesizes alpha to move between 3- and 4-channel pixel data.
/// A no-op (and non-allocating, via `Vec::from`) when `from == to`.
fn coerce_channels(pixels: &[u8], from: Channels, to: Channels) -> Vec<u8> {
    if from == to {
        return pixels.to_vec();
    }
    let mut out = Vec::with_capacity(pixels.len() / from.count() * to.count());
    for px in pixels.chunks_exact(from.count()) {
        out.extend_from_slice(&px[0..3]);
        if to == Channels::Rgba {
            out.push(if from == Channels::Rgba { px[3] } else { 255 });
        }
    }
    out
}

fn run(args: Args) -> Result<(), String> {
    let input_format = format_of(&args.input)?;
    let output_format = format_of(&args.output)?;

    let bytes = std::fs::read(&args.input)
        .map_err(|err| format!("failed to read {}: {err}", args.input.display()))?;

    let (descriptor, pixels) = match input_format {
        Format::Ppm => container::read_ppm(&bytes).map_err(|err| err.to_string())?,
        Format::Pam => container::read_pam(&bytes).map_err(|err| err.to_string())?,
        Format::Roi => {
            let header = Header::decode(&bytes).map_err(|err| err.to_string())?;
            let channels = args.channels.map(Channels::from).unwrap_or(header.channels);
            roi::decode_alloc(&bytes, channels).map_err(|err| err.to_string())?
        }
        Format::Raw => return Err("raw is only supported as an output format".into()),
    };

    log::debug!(
        "{}x{} {} codepath={:?}",
        descriptor.width,
        descriptor.height,
        descriptor.channels,
        args.codepath,
    );

    let bytes = match output_format {
        Format::Ppm => {
            let rgb = coerce_channels(&pixels, descriptor.channels, Channels::Rgb);
            let descriptor = Descriptor { channels: Channels::Rgb, ..descriptor };
            container::write_ppm(&descriptor, &rgb)
        }
        Format::Pam => container::write_pam(&descriptor, &pixels),
        Format::Roi => {
            let config = Config { codepath: args.codepath.into() };
            Encoder::encode_alloc(&pixels, descriptor, config).map_err(|err| err.to_string())?
        }
        Format::Raw => pixels,
    };

    std::fs::write(&args.output, bytes)
        .map_err(|err| format!("failed to write {}: {err}", args.output.display()))
}

fn main() -> std::process::ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(message) => {
            log::error!("{message}");
            std::process::ExitCode::FAILURE
        }
    }
}
