//! The portable scalar encoder kernel (spec.md §4.C, component C).
//!
//! One function, monomorphized over a `HAS_ALPHA` const generic instead of
//! duplicating an RGB and an RGBA copy of the loop (spec.md §9 REDESIGN
//! FLAGS: replace channel-count-parameterised macros with a generic kernel
//! over a compile-time constant). [`step`] is the single place the
//! per-pixel state machine lives; the SIMD kernel in [`crate::simd`] calls
//! it too for any 16-pixel block that doesn't qualify for its vectorised
//! run/alpha short-circuit, which is what makes "codepath equivalence"
//! (spec.md §8 property 2) true by construction rather than by a second,
//! independently-written bit-packer that has to be kept in sync.

use crate::format::{self, select_rgb_op, Diff, RgbOp};

/// Advances the encoder state by exactly one pixel, writing whatever
/// opcode bytes (if any) that pixel produces to `out` and returning the
/// count. Never touches `run`'s pending bytes itself beyond flushing them
/// when a non-run opcode must be emitted (spec.md §4.C steps 1-2); the
/// caller is responsible for flushing any still-pending run once the
/// whole image (not just this pixel) is known to be finished.
#[inline(always)]
pub(crate) fn step<const HAS_ALPHA: bool>(
    r: u8,
    g: u8,
    b: u8,
    a: u8,
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
) -> usize {
    let same = r == prev[0]
        && g == prev[1]
        && b == prev[2]
        && (!HAS_ALPHA || a == prev[3]);

    if same {
        *run += 1;
        return 0;
    }

    let mut w = format::flush_pending_run(run, out);

    if HAS_ALPHA && a != prev[3] {
        out[w] = format::RGBA_TAG;
        out[w + 1] = a;
        w += 2;
    }

    let diff = Diff::compute([r, g, b], [prev[0], prev[1], prev[2]]);
    w += match select_rgb_op(diff) {
        RgbOp::Luma232 => {
            out[w] = format::encode_luma232(diff);
            1
        }
        RgbOp::Luma464 => {
            out[w..w + 2].copy_from_slice(&format::encode_luma464(diff));
            2
        }
        RgbOp::Luma777 => {
            out[w..w + 3].copy_from_slice(&format::encode_luma777(diff));
            3
        }
        RgbOp::Rgb => {
            out[w..w + 4].copy_from_slice(&format::encode_rgb(diff));
            4
        }
    };

    *prev = [r, g, b, a];
    w
}

/// Encodes every pixel in `pixels` (already a whole number of `3`- or
/// `4`-channel pixels), threading `prev`/`run` through from the previous
/// window so window boundaries have no effect on the emitted bytes
/// (spec.md §4.B). `is_final_chunk` must be `true` only when `pixels` ends
/// at the last pixel of the whole image; it governs the "last pixel
/// extends a run" case of spec.md §4.C step 1, where only the full
/// `REPEAT30_BYTE`s are flushed here and any remainder is left for the
/// driver's final flush.
pub(crate) fn encode<const HAS_ALPHA: bool>(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    let channels = if HAS_ALPHA { 4 } else { 3 };
    debug_assert_eq!(pixels.len() % channels, 0);

    let n = pixels.len() / channels;
    let mut w = 0usize;

    for (i, px) in pixels.chunks_exact(channels).enumerate() {
        let r = px[0];
        let g = px[1];
        let b = px[2];
        let a = if HAS_ALPHA { px[3] } else { 255 };

        let step_bytes = step::<HAS_ALPHA>(r, g, b, a, prev, run, &mut out[w..]);
        let extended_run = step_bytes == 0;
        w += step_bytes;

        if is_final_chunk && i + 1 == n && extended_run {
            // This pixel matched `prev` (step bumped `run` and emitted
            // nothing) and it was the image's last pixel: flush full
            // REPEAT30_BYTEs now, leave any remainder pending for the
            // driver's final flush (spec.md §4.C step 1).
            w += format::flush_full_runs(run, &mut out[w..]);
        }
    }

    w
}
