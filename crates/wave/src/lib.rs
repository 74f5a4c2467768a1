//! Handle-based registry in front of an audio engine.
//!
//! A [`Context`] owns engines, sounds and sound groups and hands out typed,
//! copyable handles ([`Engine`], [`Sound`], [`SoundGroup`]). Every operation
//! resolves its handle against the context, forwards the work to an
//! [`AudioAdapter`] and keeps a shadow copy of what the engine was told.
//!
//! ```no_run
//! use wave::{Context, ContextSettings, HeadlessAdapter};
//!
//! # fn main() -> wave::WaveResult<()> {
//! let mut ctx = Context::new(HeadlessAdapter::new().with_source("hit.wav", 48_000, 4_800));
//! ctx.init(&ContextSettings::default())?;
//! let engine = ctx.create_engine()?;
//! let sound = ctx.create_sound_from_file(engine, "hit.wav")?;
//! engine.start(&mut ctx)?;
//! sound.play(&mut ctx)?;
//! ctx.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
mod arena;
pub mod config;
mod context;
mod engine;
mod error;
pub mod headless;
mod id;
mod playback_device;
mod sound;
mod sound_group;
pub mod types;

pub use adapter::{AudioAdapter, Fade, Timeline};
pub use config::{ContextSettings, EngineConfig, LogCallback, tracing_log_callback};
pub use context::{Context, ContextInfo};
pub use engine::Engine;
pub use error::{ResourceKind, WaveError, WaveResult};
pub use headless::{HeadlessAdapter, HeadlessOp};
pub use id::Id;
pub use playback_device::PlaybackDevice;
pub use sound::{Sound, SoundState};
pub use sound_group::{GroupMember, SoundGroup};
pub use types::{
    AttenuationModel, AudioCone, DeviceInfo, DeviceLists, DeviceType, LogLevel, PanMode,
    Positioning, SoundParams, SoundProperty, SoundSchedule, TimePoint, Vec3,
};
