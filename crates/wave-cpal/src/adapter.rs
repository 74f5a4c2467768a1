//! [`AudioAdapter`] backed by CPAL output streams.
//!
//! Each engine owns one output device, one [`Mixer`] and, while running, one
//! CPAL stream. Sounds are decoded with Symphonia and resampled to the engine
//! rate up front; the adapter then only flips voice state under the mixer
//! lock.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow, bail};
use cpal::traits::StreamTrait;
use wave::{
    AudioAdapter, DeviceLists, EngineConfig, LogCallback, LogLevel, SoundProperty, SoundSchedule,
    Vec3,
};

use crate::config::CpalConfig;
use crate::decode::{self, DecodedAudio};
use crate::device;
use crate::mixer::{self, Mixer, Voice};
use crate::playback;
use crate::resample;

/// Adapter driving real output devices through CPAL.
pub struct CpalAdapter {
    config: CpalConfig,
    host: Option<cpal::Host>,
    log_callback: Option<LogCallback>,
}

/// One output device with its mixer.
pub struct CpalEngine {
    device: cpal::Device,
    device_name: String,
    stream_config: cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mutex<Mixer>>,
    stream: Option<cpal::Stream>,
    next_key: u64,
}

impl CpalEngine {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.stream_config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.stream_config.channels
    }
}

/// A voice inside an engine's mixer.
pub struct CpalSound {
    key: u64,
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
}

impl CpalAdapter {
    pub fn new(config: CpalConfig) -> Self {
        Self {
            config,
            host: None,
            log_callback: None,
        }
    }

    pub fn config(&self) -> &CpalConfig {
        &self.config
    }

    fn host(&self) -> Result<&cpal::Host> {
        self.host
            .as_ref()
            .ok_or_else(|| anyhow!("audio host is not initialized"))
    }

    fn log(&self, level: LogLevel, message: &str) {
        if let Some(callback) = &self.log_callback {
            callback(level, message);
        }
    }

    fn add_voice(&self, engine: &mut CpalEngine, audio: DecodedAudio) -> Result<CpalSound> {
        let rate = engine.sample_rate();
        let samples = resample::resample_interleaved(
            &audio.samples,
            audio.channels,
            audio.sample_rate,
            rate,
            self.config.chunk_frames,
        )
        .with_context(|| format!("resample {} Hz -> {rate} Hz", audio.sample_rate))?;

        let key = engine.next_key;
        engine.next_key += 1;
        let voice = Voice::new(Arc::from(samples), audio.channels);
        tracing::debug!(
            key,
            frames = voice.frames(),
            source_rate_hz = audio.sample_rate,
            engine_rate_hz = rate,
            "voice added"
        );
        lock(&engine.mixer).insert(key, voice);

        Ok(CpalSound {
            key,
            mixer: engine.mixer.clone(),
            sample_rate: rate,
        })
    }
}

impl Default for CpalAdapter {
    fn default() -> Self {
        Self::new(CpalConfig::default())
    }
}

fn lock(mixer: &Mutex<Mixer>) -> MutexGuard<'_, Mixer> {
    mixer.lock().unwrap_or_else(|err| err.into_inner())
}

/// Run `f` on the sound's voice with the current engine clock.
fn with_voice<R>(sound: &CpalSound, f: impl FnOnce(&mut Voice, u64) -> R) -> Result<R> {
    let mut mixer = lock(&sound.mixer);
    let now = mixer.clock();
    let voice = mixer
        .voice_mut(sound.key)
        .ok_or_else(|| anyhow!("unknown sound {}", sound.key))?;
    Ok(f(voice, now))
}

impl AudioAdapter for CpalAdapter {
    type Engine = CpalEngine;
    type Sound = CpalSound;

    fn init(&mut self) -> Result<()> {
        let host = cpal::default_host();
        tracing::debug!(host = ?host.id(), "audio host ready");
        self.host = Some(host);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.host = None;
        self.log_callback = None;
        Ok(())
    }

    fn enumerate_devices(&mut self) -> Result<DeviceLists> {
        device::enumerate_devices(self.host()?)
    }

    fn register_log_callback(&mut self, callback: LogCallback) -> Result<()> {
        self.log_callback = Some(callback);
        Ok(())
    }

    fn init_engine(&mut self, config: &EngineConfig) -> Result<CpalEngine> {
        let host = self.host()?;
        let needle = config.device.as_deref().or(self.config.device.as_deref());
        let target_rate = config.sample_rate.or(self.config.sample_rate);

        let device = device::pick_device(host, needle)?;
        let supported = device::pick_output_config(&device, target_rate, config.channels)?;
        let mut stream_config: cpal::StreamConfig = supported.clone().into();
        if let Some(buf) = device::pick_buffer_size(&supported, self.config.max_buffer_frames) {
            stream_config.buffer_size = buf;
        }
        let device_name = device::device_name(&device);
        tracing::info!(
            device = %device_name,
            output_rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            buffer_size = ?stream_config.buffer_size,
            "engine output config"
        );
        self.log(
            LogLevel::Info,
            &format!(
                "engine on '{device_name}' at {} Hz, {} channels",
                stream_config.sample_rate, stream_config.channels
            ),
        );

        let mixer = Mixer::new(stream_config.sample_rate, stream_config.channels as usize);
        Ok(CpalEngine {
            device,
            device_name,
            sample_format: supported.sample_format(),
            stream_config,
            mixer: Arc::new(Mutex::new(mixer)),
            stream: None,
            next_key: 1,
        })
    }

    fn start_engine(&mut self, engine: &mut CpalEngine) -> Result<()> {
        if engine.stream.is_none() {
            let stream = playback::build_output_stream(
                &engine.device,
                &engine.stream_config,
                engine.sample_format,
                &engine.mixer,
            )?;
            stream.play().context("start output stream")?;
            engine.stream = Some(stream);
        }
        self.log(LogLevel::Debug, &format!("engine on '{}' started", engine.device_name));
        Ok(())
    }

    fn stop_engine(&mut self, engine: &mut CpalEngine) -> Result<()> {
        // Dropping the stream stops the callback.
        engine.stream = None;
        self.log(LogLevel::Debug, &format!("engine on '{}' stopped", engine.device_name));
        Ok(())
    }

    fn destroy_engine(&mut self, engine: &mut CpalEngine) -> Result<()> {
        ensure_silent(&engine.mixer, &engine.device_name)?;
        engine.stream = None;
        Ok(())
    }

    fn sound_from_file(&mut self, engine: &mut CpalEngine, path: &Path) -> Result<CpalSound> {
        let audio = decode::decode_file(path)?;
        self.add_voice(engine, audio)
    }

    fn sound_from_memory(&mut self, engine: &mut CpalEngine, data: Arc<[u8]>) -> Result<CpalSound> {
        let audio = decode::decode_memory(data)?;
        self.add_voice(engine, audio)
    }

    fn destroy_sound(&mut self, sound: &mut CpalSound) -> Result<()> {
        lock(&sound.mixer)
            .remove(sound.key)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown sound {}", sound.key))
    }

    fn start_sound(&mut self, sound: &mut CpalSound) -> Result<()> {
        with_voice(sound, |voice, _| voice.start())
    }

    fn stop_sound(&mut self, sound: &mut CpalSound) -> Result<()> {
        with_voice(sound, |voice, _| voice.playing = false)
    }

    fn seek_sound(&mut self, sound: &mut CpalSound, frame: u64) -> Result<()> {
        with_voice(sound, |voice, _| voice.seek(frame))
    }

    fn set_property(&mut self, sound: &mut CpalSound, property: SoundProperty) -> Result<()> {
        if !property.is_finite() {
            bail!("{} must be finite", property.name());
        }
        if let SoundProperty::Pitch(pitch) = property {
            if pitch <= 0.0 {
                bail!("pitch must be positive, got {pitch}");
            }
        }
        with_voice(sound, |voice, _| voice.params.apply(property))
    }

    fn schedule(&mut self, sound: &mut CpalSound, schedule: SoundSchedule) -> Result<()> {
        if let SoundSchedule::Fade { from, to, .. } = schedule {
            if !from.is_finite() || !to.is_finite() {
                bail!("fade volumes must be finite");
            }
        }
        let rate = sound.sample_rate;
        with_voice(sound, |voice, now| voice.timeline.apply(schedule, now, rate))
    }

    fn sample_rate(&self, sound: &CpalSound) -> Result<u32> {
        Ok(sound.sample_rate)
    }

    fn length_in_pcm_frames(&self, sound: &CpalSound) -> Result<u64> {
        with_voice(sound, |voice, _| voice.frames())
    }

    fn cursor_in_pcm_frames(&self, sound: &CpalSound) -> Result<u64> {
        with_voice(sound, |voice, _| voice.cursor())
    }

    fn current_fade_volume(&self, sound: &CpalSound) -> Result<f32> {
        with_voice(sound, |voice, now| voice.timeline.fade_volume(now))
    }

    fn time_in_pcm_frames(&self, sound: &CpalSound) -> Result<u64> {
        Ok(lock(&sound.mixer).clock())
    }

    fn direction_to_listener(&self, sound: &CpalSound) -> Result<Vec3> {
        with_voice(sound, |voice, _| mixer::direction_to_listener(voice.params.position))
    }

    fn is_at_end(&self, sound: &CpalSound) -> Result<bool> {
        with_voice(sound, |voice, _| voice.at_end)
    }

    fn is_playing(&self, sound: &CpalSound) -> Result<bool> {
        with_voice(sound, |voice, _| voice.playing)
    }
}

/// The mixer holds no voices. A running stream keeps its own handle on the
/// mixer, so voices are counted rather than handles.
fn ensure_silent(mixer: &Mutex<Mixer>, device_name: &str) -> Result<()> {
    let voices = lock(mixer).voice_count();
    if voices > 0 {
        bail!("engine on '{device_name}' still has {voices} live sounds");
    }
    Ok(())
}
