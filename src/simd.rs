//! 128-bit-SIMD encoder kernel (spec.md §4.D, component D).
//!
//! The opcode set was chosen specifically so that most real images spend
//! most of their pixels either exactly matching the previous pixel (flat
//! fills, alpha padding, scanned documents) or close enough to fall into
//! LUMA232 - the two cases this module vectorises. A 16-byte SSE2 load
//! can test 16 RGBA pixels (4 lanes) or a little over 5 RGB pixels for
//! "identical to `prev`" in one comparison, which is where the actual
//! throughput win over the scalar kernel comes from; anything that
//! doesn't qualify for that fast path is handed to [`crate::scalar`] a
//! pixel at a time; its output is what [`crate::scalar::step`] would have
//! produced for that pixel regardless, so the two codepaths are
//! byte-identical by construction (spec.md §8 property 2), not by
//! maintaining two independent bit-packers in lockstep.

#[cfg(all(target_arch = "x86_64", feature = "std"))]
mod x86;

/// Dispatches to the vectorised RGBA kernel when the compile target and
/// runtime CPU support it, otherwise the portable scalar kernel.
///
/// Runtime feature detection (`is_x86_feature_detected!`) is a `std`
/// facility, so the `no_std` build always takes the scalar path even on
/// `x86_64` - `Codepath::Simd` degrades gracefully rather than failing to
/// compile.
pub(crate) fn encode_rgba(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    #[cfg(all(target_arch = "x86_64", feature = "std"))]
    {
        if is_x86_feature_detected!("sse2") {
            // SAFETY: sse2 support was just confirmed at runtime.
            return unsafe { x86::encode::<true>(pixels, prev, run, out, is_final_chunk) };
        }
    }
    crate::scalar::encode::<true>(pixels, prev, run, out, is_final_chunk)
}

pub(crate) fn encode_rgb(
    pixels: &[u8],
    prev: &mut [u8; 4],
    run: &mut u32,
    out: &mut [u8],
    is_final_chunk: bool,
) -> usize {
    #[cfg(all(target_arch = "x86_64", feature = "std"))]
    {
        if is_x86_feature_detected!("sse2") {
            // SAFETY: sse2 support was just confirmed at runtime.
            return unsafe { x86::encode::<false>(pixels, prev, run, out, is_final_chunk) };
        }
    }
    crate::scalar::encode::<false>(pixels, prev, run, out, is_final_chunk)
}
