//! Device-free adapter with a manually driven clock.
//!
//! [`HeadlessAdapter`] simulates just enough of an audio engine to exercise
//! the registry deterministically: named in-memory sources stand in for
//! files, cursors move only when [`HeadlessAdapter::advance`] is called, and
//! any operation can be told to fail.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};

use crate::adapter::{AudioAdapter, Timeline};
use crate::config::{EngineConfig, LogCallback};
use crate::types::{
    DeviceInfo, DeviceLists, LogLevel, SoundParams, SoundProperty, SoundSchedule, Vec3,
};

const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// Memory sources are read as interleaved 16-bit stereo.
const MEMORY_FRAME_BYTES: usize = 4;

/// Adapter operations that can be made to fail with [`HeadlessAdapter::fail_on`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeadlessOp {
    Init,
    Shutdown,
    EnumerateDevices,
    RegisterLogCallback,
    InitEngine,
    StartEngine,
    StopEngine,
    DestroyEngine,
    SoundFromFile,
    SoundFromMemory,
    DestroySound,
    StartSound,
    StopSound,
    SeekSound,
    SetProperty,
    Schedule,
    /// Every read-only query.
    Query,
}

impl HeadlessOp {
    fn name(self) -> &'static str {
        match self {
            HeadlessOp::Init => "init",
            HeadlessOp::Shutdown => "shutdown",
            HeadlessOp::EnumerateDevices => "enumerate_devices",
            HeadlessOp::RegisterLogCallback => "register_log_callback",
            HeadlessOp::InitEngine => "init_engine",
            HeadlessOp::StartEngine => "start_engine",
            HeadlessOp::StopEngine => "stop_engine",
            HeadlessOp::DestroyEngine => "destroy_engine",
            HeadlessOp::SoundFromFile => "sound_from_file",
            HeadlessOp::SoundFromMemory => "sound_from_memory",
            HeadlessOp::DestroySound => "destroy_sound",
            HeadlessOp::StartSound => "start_sound",
            HeadlessOp::StopSound => "stop_sound",
            HeadlessOp::SeekSound => "seek_sound",
            HeadlessOp::SetProperty => "set_property",
            HeadlessOp::Schedule => "schedule",
            HeadlessOp::Query => "query",
        }
    }
}

/// Opaque engine key handed to the registry.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessEngine(u64);

/// Opaque sound key handed to the registry.
#[derive(Debug, PartialEq, Eq)]
pub struct HeadlessSound(u64);

/// Simulated state of one sound, as the engine sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedSound {
    pub engine: u64,
    pub params: SoundParams,
    /// Last cone angles received, in radians.
    pub cone_radians: (f32, f32),
    pub length: u64,
    pub sample_rate: u32,
    pub playing: bool,
    pub at_end: bool,
    /// Number of times the sound was started.
    pub start_calls: u32,
    pub timeline: Timeline,
    position: f64,
}

impl SimulatedSound {
    pub fn cursor(&self) -> u64 {
        self.position as u64
    }
}

struct SimulatedEngine {
    sample_rate: u32,
    running: bool,
    clock: u64,
}

#[derive(Clone, Copy)]
struct Source {
    sample_rate: u32,
    frames: u64,
}

pub struct HeadlessAdapter {
    initialized: bool,
    devices: DeviceLists,
    sources: HashMap<PathBuf, Source>,
    default_sample_rate: u32,
    failures: HashSet<HeadlessOp>,
    log_callback: Option<LogCallback>,
    engines: HashMap<u64, SimulatedEngine>,
    sounds: HashMap<u64, SimulatedSound>,
    next_key: u64,
}

impl Default for HeadlessAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessAdapter {
    pub fn new() -> Self {
        Self {
            initialized: false,
            devices: DeviceLists::default(),
            sources: HashMap::new(),
            default_sample_rate: DEFAULT_SAMPLE_RATE,
            failures: HashSet::new(),
            log_callback: None,
            engines: HashMap::new(),
            sounds: HashMap::new(),
            next_key: 1,
        }
    }

    /// Devices reported by `enumerate_devices`.
    pub fn with_devices(mut self, playback: Vec<DeviceInfo>, capture: Vec<DeviceInfo>) -> Self {
        self.devices = DeviceLists { playback, capture };
        self
    }

    /// Register a source that `sound_from_file` can open under `path`.
    pub fn with_source(mut self, path: impl Into<PathBuf>, sample_rate: u32, frames: u64) -> Self {
        self.sources.insert(path.into(), Source { sample_rate, frames });
        self
    }

    /// Engine rate used when the engine config does not ask for one.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.default_sample_rate = sample_rate;
        self
    }

    pub fn fail_on(&mut self, op: HeadlessOp) {
        self.failures.insert(op);
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    pub fn live_engines(&self) -> usize {
        self.engines.len()
    }

    pub fn live_sounds(&self) -> usize {
        self.sounds.len()
    }

    pub fn has_log_callback(&self) -> bool {
        self.log_callback.is_some()
    }

    pub fn sound(&self, sound: &HeadlessSound) -> Option<&SimulatedSound> {
        self.sounds.get(&sound.0)
    }

    pub fn is_engine_running(&self, engine: &HeadlessEngine) -> bool {
        self.engines.get(&engine.0).is_some_and(|e| e.running)
    }

    /// Emit a line through the registered log callback, if any.
    pub fn log(&self, level: LogLevel, message: &str) {
        if let Some(callback) = &self.log_callback {
            callback(level, message);
        }
    }

    /// Move every running engine's clock forward by `frames` engine frames,
    /// carrying its playing sounds along.
    pub fn advance(&mut self, frames: u64) {
        for (key, engine) in self.engines.iter_mut().filter(|(_, e)| e.running) {
            let before = engine.clock;
            engine.clock = before.saturating_add(frames);

            for sound in self.sounds.values_mut().filter(|s| s.engine == *key) {
                let t0 = rescale(before, engine.sample_rate, sound.sample_rate);
                let t1 = rescale(engine.clock, engine.sample_rate, sound.sample_rate);
                step(sound, t0, t1);
            }
        }
    }

    fn check(&self, op: HeadlessOp) -> Result<()> {
        if self.failures.contains(&op) {
            bail!("injected {} failure", op.name());
        }
        if !self.initialized && !matches!(op, HeadlessOp::Init | HeadlessOp::Shutdown) {
            bail!("adapter is not initialized");
        }
        Ok(())
    }

    fn key(&mut self) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        key
    }

    fn sim(&self, sound: &HeadlessSound) -> Result<&SimulatedSound> {
        self.check(HeadlessOp::Query)?;
        self.sounds
            .get(&sound.0)
            .ok_or_else(|| anyhow!("unknown sound {}", sound.0))
    }

    fn sim_mut(&mut self, sound: &HeadlessSound) -> Result<&mut SimulatedSound> {
        self.sounds
            .get_mut(&sound.0)
            .ok_or_else(|| anyhow!("unknown sound {}", sound.0))
    }

    /// Engine time expressed in the sound's rate.
    fn sound_time(&self, sound: &SimulatedSound) -> u64 {
        self.engines.get(&sound.engine).map_or(0, |e| {
            rescale(e.clock, e.sample_rate, sound.sample_rate)
        })
    }

    fn add_sound(&mut self, engine: &HeadlessEngine, source: Source) -> Result<HeadlessSound> {
        if !self.engines.contains_key(&engine.0) {
            bail!("unknown engine {}", engine.0);
        }
        let key = self.key();
        self.sounds.insert(
            key,
            SimulatedSound {
                engine: engine.0,
                params: SoundParams::default(),
                cone_radians: (std::f32::consts::TAU, std::f32::consts::TAU),
                length: source.frames,
                sample_rate: source.sample_rate,
                playing: false,
                at_end: false,
                start_calls: 0,
                timeline: Timeline::default(),
                position: 0.0,
            },
        );
        Ok(HeadlessSound(key))
    }
}

fn rescale(frames: u64, from: u32, to: u32) -> u64 {
    if from == to || from == 0 {
        return frames;
    }
    (u128::from(frames) * u128::from(to) / u128::from(from)) as u64
}

/// Advance one sound from sound-time `t0` to `t1`.
fn step(sound: &mut SimulatedSound, t0: u64, t1: u64) {
    if !sound.playing {
        return;
    }
    let begin = sound.timeline.start_at.map_or(t0, |at| at.max(t0));
    let end = sound.timeline.stop_at.map_or(t1, |at| at.min(t1));

    if end > begin {
        let delta = (end - begin) as f64 * f64::from(sound.params.pitch);
        sound.position += delta;
        let length = sound.length as f64;
        if sound.position >= length {
            if sound.params.looping && sound.length > 0 {
                sound.position %= length;
            } else {
                sound.position = length;
                sound.playing = false;
                sound.at_end = true;
            }
        }
    }

    if sound.timeline.take_stop(t1) {
        sound.playing = false;
    }
}

impl AudioAdapter for HeadlessAdapter {
    type Engine = HeadlessEngine;
    type Sound = HeadlessSound;

    fn init(&mut self) -> Result<()> {
        self.check(HeadlessOp::Init)?;
        self.initialized = true;
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.check(HeadlessOp::Shutdown)?;
        self.initialized = false;
        self.log_callback = None;
        Ok(())
    }

    fn enumerate_devices(&mut self) -> Result<DeviceLists> {
        self.check(HeadlessOp::EnumerateDevices)?;
        Ok(self.devices.clone())
    }

    fn register_log_callback(&mut self, callback: LogCallback) -> Result<()> {
        self.check(HeadlessOp::RegisterLogCallback)?;
        self.log_callback = Some(callback);
        Ok(())
    }

    fn init_engine(&mut self, config: &EngineConfig) -> Result<HeadlessEngine> {
        self.check(HeadlessOp::InitEngine)?;
        let sample_rate = config.sample_rate.unwrap_or(self.default_sample_rate);
        if sample_rate == 0 {
            bail!("engine sample rate must be non-zero");
        }
        let key = self.key();
        self.engines.insert(
            key,
            SimulatedEngine {
                sample_rate,
                running: false,
                clock: 0,
            },
        );
        self.log(LogLevel::Debug, &format!("engine {key} initialized at {sample_rate} Hz"));
        Ok(HeadlessEngine(key))
    }

    fn start_engine(&mut self, engine: &mut HeadlessEngine) -> Result<()> {
        self.check(HeadlessOp::StartEngine)?;
        let sim = self
            .engines
            .get_mut(&engine.0)
            .ok_or_else(|| anyhow!("unknown engine {}", engine.0))?;
        sim.running = true;
        Ok(())
    }

    fn stop_engine(&mut self, engine: &mut HeadlessEngine) -> Result<()> {
        self.check(HeadlessOp::StopEngine)?;
        let sim = self
            .engines
            .get_mut(&engine.0)
            .ok_or_else(|| anyhow!("unknown engine {}", engine.0))?;
        sim.running = false;
        Ok(())
    }

    fn destroy_engine(&mut self, engine: &mut HeadlessEngine) -> Result<()> {
        self.check(HeadlessOp::DestroyEngine)?;
        if self.sounds.values().any(|s| s.engine == engine.0) {
            bail!("engine {} still has live sounds", engine.0);
        }
        self.engines
            .remove(&engine.0)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown engine {}", engine.0))
    }

    fn sound_from_file(&mut self, engine: &mut HeadlessEngine, path: &Path) -> Result<HeadlessSound> {
        self.check(HeadlessOp::SoundFromFile)?;
        let source = *self
            .sources
            .get(path)
            .ok_or_else(|| anyhow!("no source registered at {}", path.display()))?;
        self.add_sound(engine, source)
    }

    fn sound_from_memory(&mut self, engine: &mut HeadlessEngine, data: Arc<[u8]>) -> Result<HeadlessSound> {
        self.check(HeadlessOp::SoundFromMemory)?;
        if data.is_empty() {
            bail!("memory source is empty");
        }
        let sample_rate = self
            .engines
            .get(&engine.0)
            .map(|e| e.sample_rate)
            .ok_or_else(|| anyhow!("unknown engine {}", engine.0))?;
        let source = Source {
            sample_rate,
            frames: (data.len() / MEMORY_FRAME_BYTES) as u64,
        };
        self.add_sound(engine, source)
    }

    fn destroy_sound(&mut self, sound: &mut HeadlessSound) -> Result<()> {
        self.check(HeadlessOp::DestroySound)?;
        self.sounds
            .remove(&sound.0)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown sound {}", sound.0))
    }

    fn start_sound(&mut self, sound: &mut HeadlessSound) -> Result<()> {
        self.check(HeadlessOp::StartSound)?;
        let sim = self.sim_mut(sound)?;
        if sim.at_end {
            sim.position = 0.0;
            sim.at_end = false;
        }
        sim.playing = true;
        sim.start_calls += 1;
        Ok(())
    }

    fn stop_sound(&mut self, sound: &mut HeadlessSound) -> Result<()> {
        self.check(HeadlessOp::StopSound)?;
        self.sim_mut(sound)?.playing = false;
        Ok(())
    }

    fn seek_sound(&mut self, sound: &mut HeadlessSound, frame: u64) -> Result<()> {
        self.check(HeadlessOp::SeekSound)?;
        let sim = self.sim_mut(sound)?;
        let frame = frame.min(sim.length);
        sim.position = frame as f64;
        sim.at_end = sim.length > 0 && frame == sim.length;
        Ok(())
    }

    fn set_property(&mut self, sound: &mut HeadlessSound, property: SoundProperty) -> Result<()> {
        self.check(HeadlessOp::SetProperty)?;
        if !property.is_finite() {
            bail!("{} must be finite", property.name());
        }
        if let SoundProperty::Pitch(pitch) = property {
            if pitch <= 0.0 {
                bail!("pitch must be positive, got {pitch}");
            }
        }
        let sim = self.sim_mut(sound)?;
        if let SoundProperty::Cone {
            inner_radians,
            outer_radians,
            ..
        } = property
        {
            sim.cone_radians = (inner_radians, outer_radians);
        }
        sim.params.apply(property);
        Ok(())
    }

    fn schedule(&mut self, sound: &mut HeadlessSound, schedule: SoundSchedule) -> Result<()> {
        self.check(HeadlessOp::Schedule)?;
        if let SoundSchedule::Fade { from, to, .. } = schedule {
            if !from.is_finite() || !to.is_finite() {
                bail!("fade volumes must be finite");
            }
        }
        let now = {
            let sim = self
                .sounds
                .get(&sound.0)
                .ok_or_else(|| anyhow!("unknown sound {}", sound.0))?;
            self.sound_time(sim)
        };
        let sim = self.sim_mut(sound)?;
        let rate = sim.sample_rate;
        sim.timeline.apply(schedule, now, rate);
        Ok(())
    }

    fn sample_rate(&self, sound: &HeadlessSound) -> Result<u32> {
        Ok(self.sim(sound)?.sample_rate)
    }

    fn length_in_pcm_frames(&self, sound: &HeadlessSound) -> Result<u64> {
        Ok(self.sim(sound)?.length)
    }

    fn cursor_in_pcm_frames(&self, sound: &HeadlessSound) -> Result<u64> {
        Ok(self.sim(sound)?.cursor())
    }

    fn current_fade_volume(&self, sound: &HeadlessSound) -> Result<f32> {
        let sim = self.sim(sound)?;
        Ok(sim.timeline.fade_volume(self.sound_time(sim)))
    }

    fn time_in_pcm_frames(&self, sound: &HeadlessSound) -> Result<u64> {
        let sim = self.sim(sound)?;
        Ok(self.sound_time(sim))
    }

    /// Listener sits at the origin.
    fn direction_to_listener(&self, sound: &HeadlessSound) -> Result<Vec3> {
        Ok((-self.sim(sound)?.params.position).normalized())
    }

    fn is_at_end(&self, sound: &HeadlessSound) -> Result<bool> {
        Ok(self.sim(sound)?.at_end)
    }

    fn is_playing(&self, sound: &HeadlessSound) -> Result<bool> {
        Ok(self.sim(sound)?.playing)
    }
}
