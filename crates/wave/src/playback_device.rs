//! One engine plus one sound with an ordered lifecycle.

use std::path::Path;
use std::sync::Arc;

use crate::adapter::AudioAdapter;
use crate::context::Context;
use crate::engine::Engine;
use crate::error::WaveResult;
use crate::sound::{Sound, SoundState};

/// Convenience pairing of a dedicated engine and a single sound.
///
/// The engine is started lazily on the first `play` and stopped again by
/// `stop`. Dropping the device releases nothing; call
/// [`PlaybackDevice::shutdown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackDevice {
    engine: Engine,
    sound: Sound,
}

impl PlaybackDevice {
    pub fn from_file<A: AudioAdapter>(
        ctx: &mut Context<A>,
        path: impl AsRef<Path>,
    ) -> WaveResult<Self> {
        let path = path.as_ref();
        Self::build(ctx, |ctx, engine| ctx.create_sound_from_file(engine, path))
    }

    pub fn from_memory<A: AudioAdapter>(
        ctx: &mut Context<A>,
        data: impl Into<Arc<[u8]>>,
    ) -> WaveResult<Self> {
        let data = data.into();
        Self::build(ctx, |ctx, engine| ctx.create_sound_from_memory(engine, data))
    }

    fn build<A, F>(ctx: &mut Context<A>, create_sound: F) -> WaveResult<Self>
    where
        A: AudioAdapter,
        F: FnOnce(&mut Context<A>, Engine) -> WaveResult<Sound>,
    {
        let engine = ctx.create_engine()?;
        match create_sound(ctx, engine) {
            Ok(sound) => Ok(Self { engine, sound }),
            Err(e) => {
                if let Err(cleanup) = ctx.destroy_engine(engine) {
                    tracing::warn!(engine = %engine.id(), "engine cleanup failed: {cleanup}");
                }
                Err(e)
            }
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn sound(&self) -> Sound {
        self.sound
    }

    /// Stop, then release the sound and the engine in that order.
    pub fn shutdown<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        if self.sound.state(ctx)? != SoundState::Stopped {
            self.sound.stop(ctx)?;
        }
        if self.engine.is_running(ctx)? {
            self.engine.stop(ctx)?;
        }
        ctx.destroy_sound(self.sound)?;
        ctx.destroy_engine(self.engine)
    }

    pub fn play<A: AudioAdapter>(&self, ctx: &mut Context<A>) -> WaveResult<()> {
        if self.sound.is_playing(ctx)? {
            return Ok(());
        }
        if !self.engine.is_running(ctx)? {
            self.engine.start(ctx)?;
        }
        self.sound.play(ctx)
    }

    pub fn pause<A: AudioAdapter>(&self, ctx: &mut Context<A>) -> WaveResult<()> {
        if self.sound.is_paused(ctx)? {
            return Ok(());
        }
        self.sound.pause(ctx)
    }

    pub fn restart<A: AudioAdapter>(&self, ctx: &mut Context<A>) -> WaveResult<()> {
        if !self.sound.is_playing(ctx)? {
            return Ok(());
        }
        self.sound.restart(ctx)
    }

    /// Stop the sound, then the engine.
    pub fn stop<A: AudioAdapter>(&self, ctx: &mut Context<A>) -> WaveResult<()> {
        if self.sound.state(ctx)? == SoundState::Stopped {
            return Ok(());
        }
        self.sound.stop(ctx)?;
        if self.engine.is_running(ctx)? {
            self.engine.stop(ctx)?;
        }
        Ok(())
    }
}
