//! Output device discovery and stream config selection.

use std::cmp::Reverse;

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};
use wave::{DeviceInfo, DeviceLists, DeviceType};

/// First output device whose name contains `needle` (case-insensitive), or
/// the host default when no needle is given.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or_else(|| anyhow!("host has no default output device"));
    };

    host.output_devices()
        .context("list output devices")?
        .find(|d| name_matches(&device_name(d), needle))
        .ok_or_else(|| anyhow!("no output device matches '{needle}'"))
}

/// Ranking of one supported range; the smallest rank wins.
///
/// Rates at or below the target beat rates above it, then higher rates win,
/// then the sample format closest to `f32`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Rank {
    above_target: bool,
    rate: Reverse<u32>,
    format: u8,
}

impl Rank {
    fn new(rate: u32, format: cpal::SampleFormat, target_rate: Option<u32>) -> Self {
        Self {
            above_target: target_rate.is_some_and(|t| rate > t),
            rate: Reverse(rate),
            format: format_rank(format),
        }
    }
}

/// Pick an output config for `target_rate`, preferring ranges with the
/// requested channel count when the device offers any.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: Option<u32>,
    channels: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    let mut ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .context("query output configs")?
        .collect();
    if let Some(channels) = channels {
        if ranges.iter().any(|r| r.channels() == channels) {
            ranges.retain(|r| r.channels() == channels);
        }
    }

    ranges
        .into_iter()
        .map(|range| {
            let rate = rate_within(range.min_sample_rate(), range.max_sample_rate(), target_rate);
            let rank = Rank::new(rate, range.sample_format(), target_rate);
            (rank, range.with_sample_rate(rate))
        })
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, config)| config)
        .ok_or_else(|| anyhow!("device offers no output configs"))
}

/// Fixed buffer size for devices that advertise a range, capped at
/// `max_frames` unless the device minimum is larger.
pub fn pick_buffer_size(
    config: &cpal::SupportedStreamConfig,
    max_frames: u32,
) -> Option<cpal::BufferSize> {
    match config.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            Some(cpal::BufferSize::Fixed(buffer_frames(*min, *max, max_frames)))
        }
        cpal::SupportedBufferSize::Unknown => None,
    }
}

/// Playback and capture devices of `host`, with the defaults flagged.
pub fn enumerate_devices(host: &cpal::Host) -> Result<DeviceLists> {
    let default_output = host.default_output_device().map(|d| device_key(&d));
    let default_input = host.default_input_device().map(|d| device_key(&d));

    let playback = host
        .output_devices()
        .context("list output devices")?
        .map(|d| describe(&d, DeviceType::Playback, default_output.as_deref()))
        .collect();
    let capture = host
        .input_devices()
        .context("list input devices")?
        .map(|d| describe(&d, DeviceType::Capture, default_input.as_deref()))
        .collect();

    Ok(DeviceLists { playback, capture })
}

fn describe(device: &cpal::Device, kind: DeviceType, default_key: Option<&str>) -> DeviceInfo {
    DeviceInfo {
        name: device_name(device),
        kind,
        is_default: default_key == Some(device_key(device).as_str()),
    }
}

pub(crate) fn device_name(device: &cpal::Device) -> String {
    device
        .description()
        .map(|d| d.name().to_string())
        .unwrap_or_else(|_| "unknown device".to_string())
}

/// Identity used to spot the default device; falls back to the name.
fn device_key(device: &cpal::Device) -> String {
    match device.id() {
        Ok(id) => id.to_string(),
        Err(_) => device_name(device),
    }
}

fn buffer_frames(min: u32, max: u32, cap: u32) -> u32 {
    max.min(cap).max(min)
}

fn rate_within(min: u32, max: u32, target_rate: Option<u32>) -> u32 {
    target_rate.map_or(max, |target| target.clamp(min, max))
}

fn format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => u8::MAX,
    }
}

fn name_matches(name: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    !needle.is_empty() && name.to_lowercase().contains(&needle)
}
