//! `x86_64` SSE2 fast path (spec.md §4.D).
//!
//! Two vectorised stages run ahead of the scalar kernel:
//!
//! 1. **Run detection** (phases 1-2): a 16-byte lane compared against `prev`
//!    broadcast across all lanes; an all-equal `movemask` extends `run` by a
//!    whole lane of pixels at once.
//! 2. **LUMA232 classification** (phases 3-4-6, RGBA only): when a lane isn't
//!    a run, the same 16 bytes hold 4 RGBA pixels, and `_mm_sub_epi8` against
//!    a lane shifted by one pixel computes all 4 pixels' `(vr, vg, vb, va)`
//!    diffs in a single subtract. Each diff is then classified and packed by
//!    calling [`format::select_rgb_op`] / [`format::encode_luma232`] - the
//!    exact functions the scalar kernel uses - so a mistake in this file can
//!    only ever fall back to the (slower) scalar path one pixel early, never
//!    produce output that disagrees with it. The qualifying pixels at the
//!    front of the lane are written out contiguously (no gaps, since LUMA232
//!    is always exactly one byte); the first pixel that doesn't qualify, and
//!    everything after it, is left for the next loop iteration.
//!
//! Every `unsafe` block here is a bare load/compare/shift/store; no
//! arithmetic on raw pointers beyond what `_mm_loadu_si128` needs.

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use crate::format::{self, Diff, RgbOp};

/// Number of pixels compared per SSE2 lane for the 4-channel (RGBA) kernel:
/// one `__m128i` load is exactly 4 RGBA pixels. The LUMA232 fast path below
/// shares this width, since it reuses the same 16-byte load.
const RGBA_LANE_PIXELS: usize = 4;

/// Encodes `pixels` (already validated as a whole number of 3- or
/// 4-channel pixels by [`crate::encoder::Encoder::encode_window`]).
///
/// Safety: callers only reach this function after `is_x86_feature_detected!
/// ("sse2")` returned `true` (see [`crate::simd::encode_rgba`] /
/// [`crate::simd::encode_rgb`]).
#[target_feature(enable = "sse2")]
pub(crate) unsafe fn encode<const HAS_ALPHA: bool>(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    if HAS_ALPHA {
        return unsafe { encode_rgba(pixels, prev, run, out, is_final_chunk) };
    }
    unsafe { encode_rgb(pixels, prev, run, out, is_final_chunk) }
}

#[target_feature(enable = "sse2")]
unsafe fn encode_rgba(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    let n = pixels.len() / 4;
    let mut w = 0usize;
    let mut i = 0usize;

    while i < n {
        if i + RGBA_LANE_PIXELS <= n {
            let byte_off = i * 4;
            // SAFETY: `byte_off + 16 <= pixels.len()` by the guard above.
            let block = unsafe { _mm_loadu_si128(pixels.as_ptr().add(byte_off) as *const __m128i) };
            let seed = unsafe { _mm_set1_epi32(i32::from_le_bytes(*prev)) };
            let eq = unsafe { _mm_cmpeq_epi8(block, seed) };
            let mask = unsafe { _mm_movemask_epi8(eq) };

            if mask == 0xFFFF {
                *run += RGBA_LANE_PIXELS as u32;
                i += RGBA_LANE_PIXELS;
                continue;
            }

            // Phases 3/4/6: per-lane diff, classification and packing for
            // up to 4 pixels at once. `prev_low` holds `*prev` in its low 4
            // bytes and zero elsewhere (`_mm_cvtsi32_si128` zero-extends).
            // `_mm_slli_si128(block, 4)` shifts the whole vector 4 bytes
            // toward the high end, so lane k (k=1..3) ends up holding pixel
            // (k-1)'s bytes; ORing in `prev_low` fills the vacated lane 0
            // with the pixel that precedes this block. The subtract then
            // computes, for every lane k in one instruction, `pixel[k] -
            // pixel[k-1]` (or `pixel[0] - *prev` for k=0) - exactly the
            // chain of diffs `scalar::step` computes one pixel at a time.
            let prev_low = unsafe { _mm_cvtsi32_si128(i32::from_le_bytes(*prev)) };
            let shifted = unsafe { _mm_or_si128(_mm_slli_si128(block, 4), prev_low) };
            let diff = unsafe { _mm_sub_epi8(block, shifted) };
            let mut diff_bytes = [0u8; 16];
            unsafe { _mm_storeu_si128(diff_bytes.as_mut_ptr() as *mut __m128i, diff) };

            // Classify each lane with the same predicate the scalar kernel
            // uses, so this loop can never disagree with it - at worst it
            // stops the prefix early and defers a pixel to scalar.
            let mut prefix = 0usize;
            let mut diffs = [Diff { vr: 0, vg: 0, vb: 0, vg_r: 0, vg_b: 0 }; RGBA_LANE_PIXELS];
            for (k, slot) in diffs.iter_mut().enumerate() {
                let vr = diff_bytes[4 * k] as i8;
                let vg = diff_bytes[4 * k + 1] as i8;
                let vb = diff_bytes[4 * k + 2] as i8;
                let va = diff_bytes[4 * k + 3];
                if va != 0 {
                    break; // alpha changed: needs an RGBA opcode, not this path
                }
                if vr == 0 && vg == 0 && vb == 0 {
                    break; // a zero-RGB-diff pixel extends `run`, not a LUMA232 byte
                }
                let vg_r = vr.wrapping_sub(vg);
                let vg_b = vb.wrapping_sub(vg);
                let d = Diff { vr, vg, vb, vg_r, vg_b };
                if format::select_rgb_op(d) != RgbOp::Luma232 {
                    break;
                }
                *slot = d;
                prefix += 1;
            }

            if prefix > 0 {
                w += format::flush_pending_run(run, &mut out[w..]);
                for d in &diffs[..prefix] {
                    out[w] = format::encode_luma232(*d);
                    w += 1;
                }
                let last_off = byte_off + (prefix - 1) * 4;
                prev.copy_from_slice(&pixels[last_off..last_off + 4]);
                i += prefix;
                continue;
            }
        }

        // Neither fast path applied: hand exactly one pixel to the scalar
        // kernel and retry both fast paths from the next pixel, so a run or
        // a LUMA232 stretch starting mid-lane is still caught.
        let off = i * 4;
        let px = &pixels[off..off + 4];
        w += crate::scalar::step::<true>(px[0], px[1], px[2], px[3], prev, run, &mut out[w..]);
        i += 1;
    }

    if is_final_chunk && *run > 0 {
        w += format::flush_full_runs(run, &mut out[w..]);
    }

    w
}

#[target_feature(enable = "sse2")]
unsafe fn encode_rgb(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    let channels = 3usize;
    let n = pixels.len() / channels;
    let mut w = 0usize;
    let mut i = 0usize;

    // A 16-byte RGB load straddles a non-multiple-of-3 boundary, so the
    // vectorised fast path only covers whole-pixel blocks of 5 (15 bytes);
    // the 16th loaded byte is masked out of comparison but must still be in
    // bounds, hence the extra `+ 1` on the byte-length guard below. LUMA232
    // classification is left to the scalar kernel for this channel count
    // (see DESIGN.md "SIMD scope") - the 3-byte pixel stride means the
    // single-subtract alignment trick `encode_rgba` uses above doesn't
    // extend to a 16-byte vector without crossing pixel boundaries.
    const RGB_LANE_PIXELS: usize = 5;
    while i + RGB_LANE_PIXELS <= n && i * channels + 16 <= pixels.len() {
        let byte_off = i * channels;
        let block = unsafe { _mm_loadu_si128(pixels.as_ptr().add(byte_off) as *const __m128i) };
        let seed_bytes = [
            prev[0], prev[1], prev[2], prev[0], prev[1], prev[2], prev[0], prev[1], prev[2],
            prev[0], prev[1], prev[2], prev[0], prev[1], prev[2], 0,
        ];
        let seed = unsafe { _mm_loadu_si128(seed_bytes.as_ptr() as *const __m128i) };
        let eq = unsafe { _mm_cmpeq_epi8(block, seed) };
        let mask = unsafe { _mm_movemask_epi8(eq) } & 0x7FFF;

        if mask == 0x7FFF {
            *run += RGB_LANE_PIXELS as u32;
            i += RGB_LANE_PIXELS;
            continue;
        }

        break;
    }

    if is_final_chunk && i == n && *run > 0 {
        w += format::flush_full_runs(run, &mut out[w..]);
    }

    let remainder = &pixels[i * channels..];
    w += crate::scalar::encode::<false>(remainder, prev, run, &mut out[w..], is_final_chunk);

    w
}
