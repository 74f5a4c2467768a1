//! Boundary toward the audio engine that does the actual work.
//!
//! The registry never decodes, mixes or touches a device. It drives an
//! [`AudioAdapter`] through this narrow contract and keeps the adapter's
//! engine and sound objects inside its records.
//!
//! Adapters report failures as `anyhow` errors; the registry turns them into
//! [`WaveError::Adapter`](crate::WaveError::Adapter) with the full context chain.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::{EngineConfig, LogCallback};
use crate::types::{DeviceLists, SoundProperty, SoundSchedule, Vec3};

/// Narrow functional contract to an audio engine.
///
/// An adapter sound references the adapter engine it was created from, so
/// the registry destroys every sound before its engine. Adapters may run a
/// real-time thread of their own, but they never see the registry.
pub trait AudioAdapter {
    /// Engine instance owned by an engine record.
    type Engine;
    /// Sound instance owned by a sound record.
    type Sound;

    fn init(&mut self) -> Result<()>;
    fn shutdown(&mut self) -> Result<()>;

    fn enumerate_devices(&mut self) -> Result<DeviceLists>;
    fn register_log_callback(&mut self, callback: LogCallback) -> Result<()>;

    /// Build an engine that does not start output on its own.
    fn init_engine(&mut self, config: &EngineConfig) -> Result<Self::Engine>;
    fn start_engine(&mut self, engine: &mut Self::Engine) -> Result<()>;
    fn stop_engine(&mut self, engine: &mut Self::Engine) -> Result<()>;
    /// Release the engine's resources. The registry drops the instance only
    /// after this succeeds.
    fn destroy_engine(&mut self, engine: &mut Self::Engine) -> Result<()>;

    fn sound_from_file(&mut self, engine: &mut Self::Engine, path: &Path) -> Result<Self::Sound>;
    fn sound_from_memory(&mut self, engine: &mut Self::Engine, data: Arc<[u8]>)
    -> Result<Self::Sound>;
    fn destroy_sound(&mut self, sound: &mut Self::Sound) -> Result<()>;

    /// Begin advancing the sound's cursor.
    fn start_sound(&mut self, sound: &mut Self::Sound) -> Result<()>;
    /// Stop advancing the cursor without moving it.
    fn stop_sound(&mut self, sound: &mut Self::Sound) -> Result<()>;
    fn seek_sound(&mut self, sound: &mut Self::Sound, frame: u64) -> Result<()>;

    /// Cone angles are passed in radians.
    fn set_property(&mut self, sound: &mut Self::Sound, property: SoundProperty) -> Result<()>;
    fn schedule(&mut self, sound: &mut Self::Sound, schedule: SoundSchedule) -> Result<()>;

    /// Rate the sound's cursor, length and time are expressed in.
    fn sample_rate(&self, sound: &Self::Sound) -> Result<u32>;
    fn length_in_pcm_frames(&self, sound: &Self::Sound) -> Result<u64>;
    fn cursor_in_pcm_frames(&self, sound: &Self::Sound) -> Result<u64>;
    fn current_fade_volume(&self, sound: &Self::Sound) -> Result<f32>;
    /// Engine time as seen by the sound.
    fn time_in_pcm_frames(&self, sound: &Self::Sound) -> Result<u64>;
    fn direction_to_listener(&self, sound: &Self::Sound) -> Result<Vec3>;
    fn is_at_end(&self, sound: &Self::Sound) -> Result<bool>;
    /// The sound is started and has not stopped on its own, by reaching its
    /// end or a scheduled stop time. Waiting for a start time counts as
    /// playing.
    fn is_playing(&self, sound: &Self::Sound) -> Result<bool>;
}

/// Linear volume ramp on an engine timeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fade {
    pub from: f32,
    pub to: f32,
    pub start: u64,
    pub length: u64,
}

impl Fade {
    pub fn volume_at(&self, now: u64) -> f32 {
        if self.length == 0 || now >= self.start.saturating_add(self.length) {
            return self.to;
        }
        if now <= self.start {
            return self.from;
        }
        let t = (now - self.start) as f32 / self.length as f32;
        self.from + (self.to - self.from) * t
    }
}

/// Scheduled start/stop times and fades of one sound.
///
/// Shared bookkeeping for adapters; all times are absolute engine frames.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timeline {
    pub start_at: Option<u64>,
    pub stop_at: Option<u64>,
    pub fade: Option<Fade>,
}

impl Timeline {
    pub fn apply(&mut self, schedule: SoundSchedule, now: u64, sample_rate: u32) {
        match schedule {
            SoundSchedule::StartTime(at) => {
                self.start_at = Some(at.to_pcm_frames(sample_rate));
            }
            SoundSchedule::StopTime(at) => {
                self.stop_at = Some(at.to_pcm_frames(sample_rate));
            }
            SoundSchedule::StopTimeWithFade { stop, fade } => {
                let stop = stop.to_pcm_frames(sample_rate);
                let length = fade.to_pcm_frames(sample_rate);
                self.fade = Some(Fade {
                    from: self.fade_volume(now),
                    to: 0.0,
                    start: stop.saturating_sub(length),
                    length,
                });
                self.stop_at = Some(stop);
            }
            SoundSchedule::Fade { from, to, length } => {
                let from = if from < 0.0 { self.fade_volume(now) } else { from };
                self.fade = Some(Fade {
                    from,
                    to,
                    start: now,
                    length: length.to_pcm_frames(sample_rate),
                });
            }
        }
    }

    pub fn fade_volume(&self, now: u64) -> f32 {
        self.fade.map_or(1.0, |f| f.volume_at(now))
    }

    /// A start time is set and has not been reached.
    pub fn is_waiting(&self, now: u64) -> bool {
        self.start_at.is_some_and(|at| now < at)
    }

    /// Consume a reached stop time. Returns `true` when the sound must stop.
    pub fn take_stop(&mut self, now: u64) -> bool {
        match self.stop_at {
            Some(at) if now >= at => {
                self.stop_at = None;
                true
            }
            _ => false,
        }
    }
}
