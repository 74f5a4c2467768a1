//! Engine handle and its registry record.

use crate::adapter::AudioAdapter;
use crate::context::Context;
use crate::error::{WaveError, WaveResult};
use crate::id::Id;
use crate::sound::SoundState;

/// Handle to an engine owned by a [`Context`].
///
/// Engines are created stopped. Sounds and groups bind to one engine for
/// their whole life.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Engine(Id);

impl Engine {
    pub const INVALID: Engine = Engine(Id::INVALID);

    pub(crate) const fn from_id(id: Id) -> Self {
        Self(id)
    }

    pub fn id(self) -> Id {
        self.0
    }

    /// `false` only for [`Engine::INVALID`]. A valid-looking handle may still
    /// name a destroyed engine.
    pub fn is_valid(self) -> bool {
        self.0.is_valid()
    }

    /// Start output. Fails if the engine is already running.
    pub fn start<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        let result = self.start_inner(ctx);
        ctx.record(result)
    }

    fn start_inner<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        let (adapter, registry) = ctx.parts_mut()?;
        let record = registry.engine_mut(self.0)?;
        if record.is_running {
            return Err(WaveError::EngineAlreadyRunning(self.0));
        }
        adapter.start_engine(&mut record.instance).map_err(|e| {
            WaveError::adapter(format!("failed to start engine with ID: '{}'", self.0), e)
        })?;
        record.is_running = true;
        tracing::debug!(engine = %self.0, "engine started");
        Ok(())
    }

    /// Stop output.
    ///
    /// Rejected while any sound bound to the engine is playing; stop or
    /// pause those sounds first. Sounds that ended on their own do not
    /// count.
    pub fn stop<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        let result = self.stop_inner(ctx);
        ctx.record(result)
    }

    fn stop_inner<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        let (adapter, registry) = ctx.parts_mut()?;
        if !registry.engine(self.0)?.is_running {
            return Err(WaveError::EngineNotRunning(self.0));
        }

        let mut playing = 0;
        for (id, sound) in registry.sounds.iter().filter(|(_, s)| s.engine == self.0) {
            if sound.live_state(&*adapter, id)? == SoundState::Playing {
                playing += 1;
            }
        }
        if playing > 0 {
            return Err(WaveError::EngineHasPlayingSounds {
                engine: self.0,
                playing,
            });
        }

        let record = registry.engine_mut(self.0)?;
        adapter.stop_engine(&mut record.instance).map_err(|e| {
            WaveError::adapter(format!("failed to stop engine with ID: '{}'", self.0), e)
        })?;
        record.is_running = false;
        tracing::debug!(engine = %self.0, "engine stopped");
        Ok(())
    }

    pub fn is_running<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        let result = ctx
            .registry()
            .and_then(|r| r.engine(self.0))
            .map(|r| r.is_running);
        ctx.record(result)
    }
}

pub(crate) struct EngineRecord<E> {
    pub(crate) instance: E,
    pub(crate) is_running: bool,
}

impl<E> EngineRecord<E> {
    pub(crate) fn new(instance: E) -> Self {
        Self {
            instance,
            is_running: false,
        }
    }
}
