//! Registry and lifecycle authority.
//!
//! A [`Context`] owns every engine, sound and sound group record. Handles are
//! plain ids; each call resolves its id here, drives the adapter, and on
//! success updates the record's shadow state. Failures come back as
//! [`WaveError`] and their message is also kept for
//! [`Context::last_error_message`].
//!
//! Creation and destruction follow the dependency order of the adapter:
//! a sound or group needs a live engine, and an engine cannot be destroyed
//! while anything is still bound to it.

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use crate::adapter::AudioAdapter;
use crate::arena::Arena;
use crate::config::{ContextSettings, EngineConfig, tracing_log_callback};
use crate::engine::{Engine, EngineRecord};
use crate::error::{ResourceKind, WaveError, WaveResult};
use crate::id::Id;
use crate::sound::{Sound, SoundRecord};
use crate::sound_group::{GroupMember, SoundGroup, SoundGroupRecord};
use crate::types::DeviceInfo;

/// Devices reported by a successful [`Context::init`].
///
/// Both lists are empty unless `enumerate_devices` was requested.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextInfo {
    pub playback_devices: Vec<DeviceInfo>,
    pub capture_devices: Vec<DeviceInfo>,
}

pub(crate) struct Registry<A: AudioAdapter> {
    pub(crate) engines: Arena<EngineRecord<A::Engine>>,
    pub(crate) sounds: Arena<SoundRecord<A::Sound>>,
    pub(crate) groups: Arena<SoundGroupRecord>,
}

impl<A: AudioAdapter> Registry<A> {
    fn new() -> Self {
        Self {
            engines: Arena::new(),
            sounds: Arena::new(),
            groups: Arena::new(),
        }
    }

    pub(crate) fn engine(&self, id: Id) -> WaveResult<&EngineRecord<A::Engine>> {
        self.engines
            .get(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::Engine, id))
    }

    pub(crate) fn engine_mut(&mut self, id: Id) -> WaveResult<&mut EngineRecord<A::Engine>> {
        self.engines
            .get_mut(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::Engine, id))
    }

    pub(crate) fn sound(&self, id: Id) -> WaveResult<&SoundRecord<A::Sound>> {
        self.sounds
            .get(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::Sound, id))
    }

    pub(crate) fn sound_mut(&mut self, id: Id) -> WaveResult<&mut SoundRecord<A::Sound>> {
        self.sounds
            .get_mut(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::Sound, id))
    }

    pub(crate) fn group(&self, id: Id) -> WaveResult<&SoundGroupRecord> {
        self.groups
            .get(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::SoundGroup, id))
    }

    pub(crate) fn group_mut(&mut self, id: Id) -> WaveResult<&mut SoundGroupRecord> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::SoundGroup, id))
    }

    /// Number of `(sounds, groups)` bound to `engine`.
    pub(crate) fn dependents_of(&self, engine: Id) -> (usize, usize) {
        let sounds = self.sounds.iter().filter(|(_, s)| s.engine == engine).count();
        let groups = self.groups.iter().filter(|(_, g)| g.engine == engine).count();
        (sounds, groups)
    }
}

/// Registry of audio resources in front of an [`AudioAdapter`].
///
/// Lifecycle: [`Context::new`] → [`Context::init`] → create/destroy/mutate →
/// [`Context::shutdown`]. Contexts are independent of each other; the
/// registry is single-writer, so a context is not `Sync`.
///
/// The arenas outlive shutdown, so a context never hands out an id twice,
/// even across `shutdown`/`init` cycles.
pub struct Context<A: AudioAdapter> {
    adapter: A,
    engine_config: EngineConfig,
    registry: Registry<A>,
    initialized: bool,
    last_error: RefCell<Option<String>>,
}

impl<A: AudioAdapter> Context<A> {
    /// Wrap `adapter` in an uninitialized context.
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            engine_config: EngineConfig::default(),
            registry: Registry::new(),
            initialized: false,
            last_error: RefCell::new(None),
        }
    }

    /// Bring up the adapter and allocate an empty registry.
    ///
    /// Devices are always enumerated (a failure aborts `init`), but the lists
    /// are only returned when `settings.enumerate_devices` is set.
    pub fn init(&mut self, settings: &ContextSettings) -> WaveResult<ContextInfo> {
        let result = self.init_inner(settings);
        self.record(result)
    }

    fn init_inner(&mut self, settings: &ContextSettings) -> WaveResult<ContextInfo> {
        if self.initialized {
            return Err(WaveError::AlreadyInitialized);
        }

        self.adapter
            .init()
            .map_err(|e| WaveError::adapter("failed to initialize audio backend", e))?;

        let devices = match self.adapter.enumerate_devices() {
            Ok(devices) => devices,
            Err(e) => {
                self.abort_init();
                return Err(WaveError::adapter("failed to enumerate hardware devices", e));
            }
        };

        if settings.enable_debug_logging {
            let callback = settings
                .log_callback
                .clone()
                .unwrap_or_else(tracing_log_callback);
            if let Err(e) = self.adapter.register_log_callback(callback) {
                self.abort_init();
                return Err(WaveError::adapter("failed to register log callback", e));
            }
        }

        self.engine_config = settings.engine.clone();
        self.initialized = true;
        tracing::info!(
            playback_devices = devices.playback.len(),
            capture_devices = devices.capture.len(),
            "audio context initialized"
        );

        if settings.enumerate_devices {
            Ok(ContextInfo {
                playback_devices: devices.playback,
                capture_devices: devices.capture,
            })
        } else {
            Ok(ContextInfo::default())
        }
    }

    fn abort_init(&mut self) {
        if let Err(e) = self.adapter.shutdown() {
            tracing::warn!("audio backend shutdown after failed init: {e:#}");
        }
    }

    /// Release every resource, then tear down the adapter.
    ///
    /// Sounds go first, then groups, then engines. If the adapter fails to
    /// shut down the context stays initialized (now empty) and the call can
    /// be retried. Handles issued before a successful shutdown are dead.
    pub fn shutdown(&mut self) -> WaveResult<()> {
        let result = self.shutdown_inner();
        self.record(result)
    }

    fn shutdown_inner(&mut self) -> WaveResult<()> {
        let (adapter, registry) = self.parts_mut()?;

        for (id, mut record) in registry.sounds.take_all() {
            if let Err(e) = adapter.destroy_sound(&mut record.instance) {
                tracing::warn!(sound = %id, "sound release during shutdown failed: {e:#}");
            }
        }
        registry.groups.take_all();
        for (id, mut record) in registry.engines.take_all() {
            if let Err(e) = adapter.destroy_engine(&mut record.instance) {
                tracing::warn!(engine = %id, "engine release during shutdown failed: {e:#}");
            }
        }

        adapter
            .shutdown()
            .map_err(|e| WaveError::adapter("failed to shut down audio backend", e))?;
        self.initialized = false;
        tracing::info!("audio context shut down");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create a stopped engine.
    pub fn create_engine(&mut self) -> WaveResult<Engine> {
        let result = self.create_engine_inner();
        self.record(result)
    }

    fn create_engine_inner(&mut self) -> WaveResult<Engine> {
        if !self.initialized {
            return Err(WaveError::NotInitialized);
        }

        let instance = self
            .adapter
            .init_engine(&self.engine_config)
            .map_err(|e| WaveError::adapter("failed to create engine", e))?;

        match self.registry.engines.insert(EngineRecord::new(instance)) {
            Ok(id) => {
                tracing::debug!(engine = %id, "engine created");
                Ok(Engine::from_id(id))
            }
            Err(mut record) => {
                if let Err(e) = self.adapter.destroy_engine(&mut record.instance) {
                    tracing::warn!("engine release failed: {e:#}");
                }
                Err(WaveError::IdSpaceExhausted(ResourceKind::Engine))
            }
        }
    }

    /// Destroy an engine with nothing bound to it.
    ///
    /// Live sounds or groups on the engine are an ordering violation and
    /// the call is rejected with [`WaveError::EngineHasDependents`]. The
    /// record is erased only once the adapter has released the engine, so a
    /// failed call leaves the handle valid and can be retried.
    pub fn destroy_engine(&mut self, engine: Engine) -> WaveResult<()> {
        let result = self.destroy_engine_inner(engine);
        self.record(result)
    }

    fn destroy_engine_inner(&mut self, engine: Engine) -> WaveResult<()> {
        let (adapter, registry) = self.parts_mut()?;
        let id = engine.id();
        registry.engine(id)?;

        let (sounds, groups) = registry.dependents_of(id);
        if sounds > 0 || groups > 0 {
            return Err(WaveError::EngineHasDependents {
                engine: id,
                sounds,
                groups,
            });
        }

        adapter
            .destroy_engine(&mut registry.engine_mut(id)?.instance)
            .map_err(|e| WaveError::adapter(format!("failed to destroy engine with ID: '{id}'"), e))?;
        registry.engines.remove(id);
        tracing::debug!(engine = %id, "engine destroyed");
        Ok(())
    }

    /// Create a sound on `engine` from an audio file.
    pub fn create_sound_from_file(
        &mut self,
        engine: Engine,
        path: impl AsRef<Path>,
    ) -> WaveResult<Sound> {
        let path = path.as_ref();
        let origin = format!("'{}'", path.display());
        let result = self.create_sound_with(engine, &origin, |adapter, instance| {
            adapter.sound_from_file(instance, path)
        });
        self.record(result)
    }

    /// Create a sound on `engine` from encoded bytes held in memory.
    pub fn create_sound_from_memory(
        &mut self,
        engine: Engine,
        data: impl Into<Arc<[u8]>>,
    ) -> WaveResult<Sound> {
        let data = data.into();
        let origin = format!("memory ({} bytes)", data.len());
        let result = self.create_sound_with(engine, &origin, |adapter, instance| {
            adapter.sound_from_memory(instance, data)
        });
        self.record(result)
    }

    fn create_sound_with<F>(&mut self, engine: Engine, origin: &str, open: F) -> WaveResult<Sound>
    where
        F: FnOnce(&mut A, &mut A::Engine) -> anyhow::Result<A::Sound>,
    {
        let (adapter, registry) = self.parts_mut()?;
        let engine_record = registry.engine_mut(engine.id())?;

        let mut instance = open(&mut *adapter, &mut engine_record.instance)
            .map_err(|e| WaveError::adapter(format!("failed to create sound from {origin}"), e))?;

        let measured = adapter.length_in_pcm_frames(&instance).and_then(|frames| {
            let rate = adapter.sample_rate(&instance)?;
            anyhow::ensure!(rate > 0, "sample rate is zero");
            Ok((frames, rate))
        });
        let (length, sample_rate) = match measured {
            Ok(measured) => measured,
            Err(cause) => {
                if let Err(e) = adapter.destroy_sound(&mut instance) {
                    tracing::warn!("sound release failed: {e:#}");
                }
                return Err(WaveError::adapter(
                    format!("failed to determine length of sound from {origin}"),
                    cause,
                ));
            }
        };

        let record = SoundRecord::new(engine.id(), instance, length, sample_rate);
        match registry.sounds.insert(record) {
            Ok(id) => {
                tracing::debug!(sound = %id, engine = %engine.id(), length, sample_rate, "sound created");
                Ok(Sound::from_id(id))
            }
            Err(mut record) => {
                if let Err(e) = adapter.destroy_sound(&mut record.instance) {
                    tracing::warn!("sound release failed: {e:#}");
                }
                Err(WaveError::IdSpaceExhausted(ResourceKind::Sound))
            }
        }
    }

    /// Destroy a sound and detach it from its group.
    ///
    /// On adapter failure the sound stays registered and grouped.
    pub fn destroy_sound(&mut self, sound: Sound) -> WaveResult<()> {
        let result = self.destroy_sound_inner(sound);
        self.record(result)
    }

    fn destroy_sound_inner(&mut self, sound: Sound) -> WaveResult<()> {
        let (adapter, registry) = self.parts_mut()?;
        let id = sound.id();
        adapter
            .destroy_sound(&mut registry.sound_mut(id)?.instance)
            .map_err(|e| WaveError::adapter(format!("failed to destroy sound with ID: '{id}'"), e))?;

        let record = registry
            .sounds
            .remove(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::Sound, id))?;
        if let Some(group) = record.group.and_then(|g| registry.groups.get_mut(g)) {
            group.members.retain(|m| *m != GroupMember::Sound(sound));
        }
        tracing::debug!(sound = %id, "sound destroyed");
        Ok(())
    }

    /// Create a sound group on `engine`, optionally nested under `parent`.
    ///
    /// A group is parented only here, so groups always form a forest.
    pub fn create_sound_group(
        &mut self,
        engine: Engine,
        parent: Option<SoundGroup>,
    ) -> WaveResult<SoundGroup> {
        let result = self.create_sound_group_inner(engine, parent);
        self.record(result)
    }

    fn create_sound_group_inner(
        &mut self,
        engine: Engine,
        parent: Option<SoundGroup>,
    ) -> WaveResult<SoundGroup> {
        let (_, registry) = self.parts_mut()?;
        registry.engine(engine.id())?;

        if let Some(parent) = parent {
            let parent_engine = registry.group(parent.id())?.engine;
            if parent_engine != engine.id() {
                return Err(WaveError::EngineMismatch {
                    kind: ResourceKind::SoundGroup,
                    id: parent.id(),
                    expected: engine.id(),
                    actual: parent_engine,
                });
            }
        }

        let record = SoundGroupRecord::new(engine.id(), parent.map(SoundGroup::id));
        let id = registry
            .groups
            .insert(record)
            .map_err(|_| WaveError::IdSpaceExhausted(ResourceKind::SoundGroup))?;
        let group = SoundGroup::from_id(id);

        if let Some(parent) = parent {
            registry
                .group_mut(parent.id())?
                .members
                .push(GroupMember::Group(group));
        }
        tracing::debug!(group = %id, engine = %engine.id(), "sound group created");
        Ok(group)
    }

    /// Destroy a group without sub-groups.
    ///
    /// Member sounds stay alive and become ungrouped.
    pub fn destroy_sound_group(&mut self, group: SoundGroup) -> WaveResult<()> {
        let result = self.destroy_sound_group_inner(group);
        self.record(result)
    }

    fn destroy_sound_group_inner(&mut self, group: SoundGroup) -> WaveResult<()> {
        let (_, registry) = self.parts_mut()?;
        let id = group.id();
        let subgroups = registry
            .group(id)?
            .members
            .iter()
            .filter(|m| matches!(m, GroupMember::Group(_)))
            .count();
        if subgroups > 0 {
            return Err(WaveError::GroupHasSubgroups {
                group: id,
                subgroups,
            });
        }

        let record = registry
            .groups
            .remove(id)
            .ok_or_else(|| WaveError::invalid(ResourceKind::SoundGroup, id))?;
        for member in &record.members {
            if let GroupMember::Sound(sound) = member {
                if let Some(sound) = registry.sounds.get_mut(sound.id()) {
                    sound.group = None;
                }
            }
        }
        if let Some(parent) = record.parent.and_then(|p| registry.groups.get_mut(p)) {
            parent.members.retain(|m| *m != GroupMember::Group(group));
        }
        tracing::debug!(group = %id, "sound group destroyed");
        Ok(())
    }

    /// Message of the most recent failed operation on this context.
    ///
    /// Successful operations leave it untouched.
    pub fn last_error_message(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    pub fn engine_count(&self) -> usize {
        self.registry.engines.len()
    }

    pub fn sound_count(&self) -> usize {
        self.registry.sounds.len()
    }

    pub fn sound_group_count(&self) -> usize {
        self.registry.groups.len()
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    /// Adapter-level object behind an engine handle.
    pub fn adapter_engine(&self, engine: Engine) -> WaveResult<&A::Engine> {
        let result = self
            .registry()
            .and_then(|r| r.engine(engine.id()))
            .map(|r| &r.instance);
        self.record(result)
    }

    /// Adapter-level object behind a sound handle.
    pub fn adapter_sound(&self, sound: Sound) -> WaveResult<&A::Sound> {
        let result = self
            .registry()
            .and_then(|r| r.sound(sound.id()))
            .map(|r| &r.instance);
        self.record(result)
    }

    pub(crate) fn registry(&self) -> WaveResult<&Registry<A>> {
        if self.initialized {
            Ok(&self.registry)
        } else {
            Err(WaveError::NotInitialized)
        }
    }

    pub(crate) fn parts_mut(&mut self) -> WaveResult<(&mut A, &mut Registry<A>)> {
        if self.initialized {
            Ok((&mut self.adapter, &mut self.registry))
        } else {
            Err(WaveError::NotInitialized)
        }
    }

    /// Remember the message of a failed result before handing it back.
    pub(crate) fn record<T>(&self, result: WaveResult<T>) -> WaveResult<T> {
        if let Err(e) = &result {
            tracing::warn!("{e}");
            *self.last_error.borrow_mut() = Some(e.to_string());
        }
        result
    }
}

impl<A: AudioAdapter> Drop for Context<A> {
    fn drop(&mut self) {
        if self.initialized {
            if let Err(e) = self.shutdown_inner() {
                tracing::warn!("audio context shutdown on drop failed: {e}");
            }
        }
    }
}
