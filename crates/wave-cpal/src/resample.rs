//! Sample-rate conversion of whole decoded sources.
//!
//! Uses Rubato's sinc resampler to bring decoded interleaved `f32` audio to
//! the engine rate once, at sound creation, so the mixer only ever reads
//! engine-rate frames.

use anyhow::{Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};

/// Convert interleaved `input` from `src_rate` to `dst_rate`.
///
/// The output holds `ceil(frames * dst_rate / src_rate)` frames. Equal rates
/// return a copy.
pub fn resample_interleaved(
    input: &[f32],
    channels: usize,
    src_rate: u32,
    dst_rate: u32,
    chunk_frames: usize,
) -> Result<Vec<f32>> {
    if channels == 0 || src_rate == 0 || dst_rate == 0 {
        return Err(anyhow!(
            "invalid resample request: {channels} channels, {src_rate} Hz -> {dst_rate} Hz"
        ));
    }
    if src_rate == dst_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let in_frames = input.len() / channels;
    let f_ratio = dst_rate as f64 / src_rate as f64;
    let expected_frames = expected_output_frames(in_frames, src_rate, dst_rate);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let chunk_in_frames = chunk_frames.max(1);
    let mut resampler = Async::<f32>::new_sinc(
        f_ratio,
        1.1,
        &params,
        chunk_in_frames,
        channels,
        FixedAsync::Input,
    )
    .map_err(|e| anyhow!("resampler init error: {e}"))?;

    let out_capacity_frames = (chunk_in_frames as f64 * f_ratio * 1.1).ceil() as usize + 16;
    let mut out_chunk = vec![0.0f32; out_capacity_frames * channels];
    let mut output = Vec::with_capacity((expected_frames + out_capacity_frames) * channels);

    let mut indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: None,
    };

    // Full chunks, then the partial tail, then silence until the filter
    // delay has been flushed out.
    let silence = vec![0.0f32; chunk_in_frames * channels];
    let mut offset = 0usize;
    let mut flush_rounds = 0usize;
    while output.len() < expected_frames * channels {
        let remaining = in_frames.saturating_sub(offset);
        let (chunk, partial) = if remaining >= chunk_in_frames {
            let start = offset * channels;
            (&input[start..start + chunk_in_frames * channels], None)
        } else if remaining > 0 {
            (&input[offset * channels..], Some(remaining))
        } else {
            flush_rounds += 1;
            if flush_rounds > 64 {
                break;
            }
            (&silence[..], None)
        };
        let chunk_frames_in = chunk.len() / channels;

        let input_adapter = InterleavedSlice::new(chunk, channels, chunk_frames_in)
            .map_err(|e| anyhow!("interleaved slice (input) error: {e}"))?;
        let mut output_adapter =
            InterleavedSlice::new_mut(&mut out_chunk, channels, out_capacity_frames)
                .map_err(|e| anyhow!("interleaved slice (output) error: {e}"))?;

        indexing.partial_len = partial;
        let (_nbr_in, nbr_out) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
            .map_err(|e| anyhow!("resampler process error: {e}"))?;

        output.extend_from_slice(&out_chunk[..nbr_out * channels]);
        offset += chunk_frames_in.min(remaining);
    }

    output.resize(expected_frames * channels, 0.0);
    Ok(output)
}

pub fn expected_output_frames(frames: usize, src_rate: u32, dst_rate: u32) -> usize {
    let num = frames as u128 * u128::from(dst_rate);
    num.div_ceil(u128::from(src_rate)) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_rates_pass_through() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let out = resample_interleaved(&input, 2, 48_000, 48_000, 1024).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn upsampling_doubles_frame_count() {
        let input = vec![0.25f32; 2 * 3_000];
        let out = resample_interleaved(&input, 2, 24_000, 48_000, 512).unwrap();
        assert_eq!(out.len(), 2 * 6_000);
        // Steady-state DC level survives the filter.
        let mid = out[2 * 3_000];
        assert!((mid - 0.25).abs() < 0.05, "mid sample {mid}");
    }

    #[test]
    fn downsampling_short_input_still_flushes() {
        let input = vec![0.5f32; 100];
        let out = resample_interleaved(&input, 1, 44_100, 22_050, 1024).unwrap();
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn rejects_zero_rates() {
        assert!(resample_interleaved(&[0.0], 1, 0, 48_000, 1024).is_err());
    }

    #[test]
    fn expected_frames_round_up() {
        assert_eq!(expected_output_frames(441, 44_100, 48_000), 480);
        assert_eq!(expected_output_frames(1, 3, 2), 1);
    }
}
