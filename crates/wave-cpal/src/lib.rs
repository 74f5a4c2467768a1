//! CPAL output backend for the `wave` registry.
//!
//! ```no_run
//! use wave::{Context, ContextSettings};
//! use wave_cpal::{CpalAdapter, CpalConfig};
//!
//! # fn main() -> wave::WaveResult<()> {
//! let mut ctx = Context::new(CpalAdapter::new(CpalConfig::default()));
//! ctx.init(&ContextSettings::default())?;
//! let device = wave::PlaybackDevice::from_file(&mut ctx, "music.flac")?;
//! device.play(&mut ctx)?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod decode;
pub mod device;
pub mod mixer;
pub mod playback;
pub mod resample;

pub use adapter::{CpalAdapter, CpalEngine, CpalSound};
pub use config::CpalConfig;
