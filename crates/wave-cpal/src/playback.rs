//! Playback stage (CPAL output stream).
//!
//! Builds the CPAL output stream for one engine. The callback renders the
//! engine's [`Mixer`] into a local `f32` buffer and converts it to the device
//! sample format.

use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::mixer::Mixer;

/// Build a CPAL output stream that plays whatever `mixer` renders.
///
/// The mixer must be configured with the stream's channel count and rate.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: &Arc<Mutex<Mixer>>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, mixer),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, mixer),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: &Arc<Mutex<Mixer>>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let mixer_cb = mixer.clone();
    let mut scratch: Vec<f32> = Vec::new();

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            scratch.resize(data.len(), 0.0);
            {
                let mut mixer = mixer_cb.lock().unwrap_or_else(|err| err.into_inner());
                mixer.render(&mut scratch);
            }
            write_converted(data, &scratch);
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn write_converted<T>(data: &mut [T], rendered: &[f32])
where
    T: cpal::Sample + cpal::FromSample<f32>,
{
    for (out, sample) in data.iter_mut().zip(rendered) {
        *out = <T as cpal::Sample>::from_sample::<f32>(sample.clamp(-1.0, 1.0));
    }
}
