//! Sound handle: transport state machine, shadowed properties and live
//! queries.
//!
//! Setters forward to the adapter first and write the shadow only once the
//! adapter accepted the value, so a getter always reports what the engine
//! was last told. Live queries bypass the shadow.
//!
//! The transport shadow is the exception: a sound can stop on its own when
//! it reaches its end or a scheduled stop time, so a shadowed `Playing` is
//! confirmed with the adapter before it is reported or acted on.

use crate::adapter::AudioAdapter;
use crate::context::Context;
use crate::engine::Engine;
use crate::error::{WaveError, WaveResult};
use crate::id::Id;
use crate::sound_group::SoundGroup;
use crate::types::{
    AttenuationModel, AudioCone, PanMode, Positioning, SoundParams, SoundProperty, SoundSchedule,
    TimePoint, Vec3, degrees_to_radians,
};

/// Transport state derived from the shadow flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transport {
    Play,
    Pause,
    Stop,
    Restart,
}

pub(crate) struct SoundRecord<S> {
    pub(crate) instance: S,
    pub(crate) engine: Id,
    pub(crate) group: Option<Id>,
    pub(crate) params: SoundParams,
    pub(crate) length_in_pcm_frames: u64,
    pub(crate) sample_rate: u32,
    pub(crate) is_playing: bool,
    pub(crate) is_paused: bool,
}

impl<S> SoundRecord<S> {
    pub(crate) fn new(engine: Id, instance: S, length_in_pcm_frames: u64, sample_rate: u32) -> Self {
        Self {
            instance,
            engine,
            group: None,
            params: SoundParams::default(),
            length_in_pcm_frames,
            sample_rate,
            is_playing: false,
            is_paused: false,
        }
    }

    pub(crate) fn state(&self) -> SoundState {
        if self.is_playing {
            SoundState::Playing
        } else if self.is_paused {
            SoundState::Paused
        } else {
            SoundState::Stopped
        }
    }

    /// Transport state with a shadowed `Playing` checked against the adapter.
    pub(crate) fn live_state<A>(&self, adapter: &A, id: Id) -> WaveResult<SoundState>
    where
        A: AudioAdapter<Sound = S>,
    {
        if self.is_playing && !adapter_playing(adapter, id, &self.instance)? {
            return Ok(SoundState::Stopped);
        }
        Ok(self.state())
    }
}

fn adapter_playing<A: AudioAdapter>(adapter: &A, id: Id, instance: &A::Sound) -> WaveResult<bool> {
    adapter.is_playing(instance).map_err(|e| {
        WaveError::adapter(format!("failed to query playback state of sound with ID: '{id}'"), e)
    })
}

/// Drive one sound through a transport command.
///
/// Shared by [`Sound`] and group transport. A sound that stopped on its own
/// is settled to `Stopped` first; otherwise shadow flags change only after
/// the adapter call succeeded.
pub(crate) fn apply_transport<A: AudioAdapter>(
    adapter: &mut A,
    id: Id,
    record: &mut SoundRecord<A::Sound>,
    command: Transport,
) -> WaveResult<()> {
    let fail = |what: &str, e: anyhow::Error| {
        WaveError::adapter(format!("failed to {what} sound with ID: '{id}'"), e)
    };

    if record.is_playing && !adapter_playing(adapter, id, &record.instance)? {
        record.is_playing = false;
        tracing::debug!(sound = %id, "sound stopped on its own");
    }

    match command {
        Transport::Play => {
            if !record.is_playing {
                adapter
                    .start_sound(&mut record.instance)
                    .map_err(|e| fail("play", e))?;
                record.is_playing = true;
            }
            record.is_paused = false;
        }
        Transport::Pause => {
            if record.is_playing {
                adapter
                    .stop_sound(&mut record.instance)
                    .map_err(|e| fail("pause", e))?;
                record.is_playing = false;
                record.is_paused = true;
            }
        }
        Transport::Stop => {
            adapter
                .stop_sound(&mut record.instance)
                .map_err(|e| fail("stop", e))?;
            record.is_playing = false;
            record.is_paused = false;
            adapter
                .seek_sound(&mut record.instance, 0)
                .map_err(|e| fail("rewind", e))?;
        }
        Transport::Restart => {
            if record.is_playing {
                adapter
                    .seek_sound(&mut record.instance, 0)
                    .map_err(|e| fail("restart", e))?;
            }
        }
    }
    tracing::debug!(sound = %id, ?command, state = ?record.state(), "sound transport");
    Ok(())
}

/// Handle to a sound owned by a [`Context`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sound(Id);

impl Sound {
    pub const INVALID: Sound = Sound(Id::INVALID);

    pub(crate) const fn from_id(id: Id) -> Self {
        Self(id)
    }

    pub fn id(self) -> Id {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0.is_valid()
    }

    // Transport

    /// Start or resume playback. Idempotent while playing.
    pub fn play<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Play)
    }

    /// Stop advancing and keep the cursor. A no-op unless playing.
    pub fn pause<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Pause)
    }

    /// Stop and rewind to the first frame.
    pub fn stop<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Stop)
    }

    /// Rewind in place while playing. A no-op otherwise.
    pub fn restart<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Restart)
    }

    fn transport<A: AudioAdapter>(self, ctx: &mut Context<A>, command: Transport) -> WaveResult<()> {
        let result = ctx.parts_mut().and_then(|(adapter, registry)| {
            let record = registry.sound_mut(self.0)?;
            apply_transport(adapter, self.0, record, command)
        });
        ctx.record(result)
    }

    /// Move the cursor without changing the transport state.
    pub fn seek_to_pcm_frame<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        frame: u64,
    ) -> WaveResult<()> {
        let result = ctx.parts_mut().and_then(|(adapter, registry)| {
            let record = registry.sound_mut(self.0)?;
            adapter
                .seek_sound(&mut record.instance, frame)
                .map_err(|e| {
                    WaveError::adapter(format!("failed to seek sound with ID: '{}'", self.0), e)
                })
        });
        ctx.record(result)
    }

    /// A sound that ran to its end or hit its stop time reports `Stopped`.
    pub fn state<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<SoundState> {
        let result = ctx
            .registry()
            .and_then(|r| r.sound(self.0))
            .and_then(|record| record.live_state(ctx.adapter(), self.0));
        ctx.record(result)
    }

    pub fn is_playing<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        Ok(self.state(ctx)? == SoundState::Playing)
    }

    pub fn is_paused<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        self.read(ctx, |r| r.is_paused)
    }

    /// Engine this sound was created on.
    pub fn engine<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Engine> {
        self.read(ctx, |r| Engine::from_id(r.engine))
    }

    pub fn group<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Option<SoundGroup>> {
        self.read(ctx, |r| r.group.map(SoundGroup::from_id))
    }

    // Shadowed properties

    pub fn set_volume<A: AudioAdapter>(self, ctx: &mut Context<A>, volume: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Volume(volume), |p| p.volume = volume)
    }

    pub fn volume<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.volume)
    }

    pub fn set_pitch<A: AudioAdapter>(self, ctx: &mut Context<A>, pitch: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Pitch(pitch), |p| p.pitch = pitch)
    }

    pub fn pitch<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.pitch)
    }

    pub fn set_doppler_factor<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        factor: f32,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::DopplerFactor(factor), |p| {
            p.doppler_factor = factor
        })
    }

    pub fn doppler_factor<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.doppler_factor)
    }

    pub fn set_position<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        position: Vec3,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Position(position), |p| {
            p.position = position
        })
    }

    pub fn position<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Vec3> {
        self.param(ctx, |p| p.position)
    }

    pub fn set_direction<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        direction: Vec3,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Direction(direction), |p| {
            p.direction = direction
        })
    }

    pub fn direction<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Vec3> {
        self.param(ctx, |p| p.direction)
    }

    pub fn set_velocity<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        velocity: Vec3,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Velocity(velocity), |p| {
            p.velocity = velocity
        })
    }

    pub fn velocity<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Vec3> {
        self.param(ctx, |p| p.velocity)
    }

    /// Set the directional cone. Angles are in degrees.
    pub fn set_cone<A: AudioAdapter>(self, ctx: &mut Context<A>, cone: AudioCone) -> WaveResult<()> {
        let property = SoundProperty::Cone {
            inner_radians: degrees_to_radians(cone.inner_angle),
            outer_radians: degrees_to_radians(cone.outer_angle),
            outer_gain: cone.outer_gain,
        };
        self.update(ctx, property, |p| p.cone = cone)
    }

    /// Directional cone in degrees.
    pub fn cone<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<AudioCone> {
        self.param(ctx, |p| p.cone)
    }

    pub fn set_min_gain<A: AudioAdapter>(self, ctx: &mut Context<A>, gain: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::MinGain(gain), |p| p.min_gain = gain)
    }

    pub fn min_gain<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.min_gain)
    }

    pub fn set_max_gain<A: AudioAdapter>(self, ctx: &mut Context<A>, gain: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::MaxGain(gain), |p| p.max_gain = gain)
    }

    pub fn max_gain<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.max_gain)
    }

    pub fn set_min_distance<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        distance: f32,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::MinDistance(distance), |p| {
            p.min_distance = distance
        })
    }

    pub fn min_distance<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.min_distance)
    }

    pub fn set_max_distance<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        distance: f32,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::MaxDistance(distance), |p| {
            p.max_distance = distance
        })
    }

    pub fn max_distance<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.max_distance)
    }

    /// Rolloff applied by the attenuation model.
    pub fn set_falloff<A: AudioAdapter>(self, ctx: &mut Context<A>, falloff: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Falloff(falloff), |p| p.falloff = falloff)
    }

    pub fn falloff<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.falloff)
    }

    pub fn set_attenuation_model<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        model: AttenuationModel,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::AttenuationModel(model), |p| {
            p.attenuation_model = model
        })
    }

    pub fn attenuation_model<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<AttenuationModel> {
        self.param(ctx, |p| p.attenuation_model)
    }

    pub fn set_directional_attenuation_factor<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        factor: f32,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::DirectionalAttenuationFactor(factor), |p| {
            p.directional_attenuation_factor = factor
        })
    }

    pub fn directional_attenuation_factor<A: AudioAdapter>(
        self,
        ctx: &Context<A>,
    ) -> WaveResult<f32> {
        self.param(ctx, |p| p.directional_attenuation_factor)
    }

    /// Stereo pan in `-1.0..=1.0`, left to right.
    pub fn set_pan<A: AudioAdapter>(self, ctx: &mut Context<A>, pan: f32) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Pan(pan), |p| p.pan = pan)
    }

    pub fn pan<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.param(ctx, |p| p.pan)
    }

    pub fn set_pan_mode<A: AudioAdapter>(self, ctx: &mut Context<A>, mode: PanMode) -> WaveResult<()> {
        self.update(ctx, SoundProperty::PanMode(mode), |p| p.pan_mode = mode)
    }

    pub fn pan_mode<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<PanMode> {
        self.param(ctx, |p| p.pan_mode)
    }

    pub fn set_positioning<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        positioning: Positioning,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Positioning(positioning), |p| {
            p.positioning = positioning
        })
    }

    pub fn positioning<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Positioning> {
        self.param(ctx, |p| p.positioning)
    }

    pub fn set_looping<A: AudioAdapter>(self, ctx: &mut Context<A>, looping: bool) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Looping(looping), |p| p.looping = looping)
    }

    pub fn is_looping<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        self.param(ctx, |p| p.looping)
    }

    pub fn set_spatialized<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        spatialized: bool,
    ) -> WaveResult<()> {
        self.update(ctx, SoundProperty::Spatialized(spatialized), |p| {
            p.spatialized = spatialized
        })
    }

    pub fn is_spatialized<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        self.param(ctx, |p| p.spatialized)
    }

    /// Full shadow copy of the sound's properties.
    pub fn params<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<SoundParams> {
        self.param(ctx, |p| *p)
    }

    // Cached at creation

    pub fn length_in_pcm_frames<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<u64> {
        self.read(ctx, |r| r.length_in_pcm_frames)
    }

    pub fn length_in_seconds<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.read(ctx, |r| r.length_in_pcm_frames as f32 / r.sample_rate as f32)
    }

    pub fn sample_rate<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<u32> {
        self.read(ctx, |r| r.sample_rate)
    }

    // Live queries

    pub fn cursor_in_pcm_frames<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<u64> {
        self.query(ctx, "cursor", |a, s| a.cursor_in_pcm_frames(s))
    }

    pub fn cursor_in_seconds<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        let rate = self.sample_rate(ctx)?;
        let frames = self.cursor_in_pcm_frames(ctx)?;
        Ok(frames as f32 / rate as f32)
    }

    /// Playback position in seconds. Same as [`Sound::cursor_in_seconds`].
    pub fn sound_cursor<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.cursor_in_seconds(ctx)
    }

    pub fn current_fade_volume<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<f32> {
        self.query(ctx, "fade volume", |a, s| a.current_fade_volume(s))
    }

    /// Engine time seen by the sound, in the sound's sample rate.
    pub fn time_in_pcm_frames<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<u64> {
        self.query(ctx, "time", |a, s| a.time_in_pcm_frames(s))
    }

    pub fn time_in_milliseconds<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<u64> {
        let rate = self.sample_rate(ctx)?;
        let frames = self.time_in_pcm_frames(ctx)?;
        Ok(frames.saturating_mul(1000) / u64::from(rate))
    }

    pub fn direction_to_listener<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Vec3> {
        self.query(ctx, "direction to listener", |a, s| a.direction_to_listener(s))
    }

    pub fn is_at_end<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        self.query(ctx, "end state", |a, s| a.is_at_end(s))
    }

    // Scheduling. Nothing here is shadowed.

    pub fn set_start_time_in_pcm_frames<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        frames: u64,
    ) -> WaveResult<()> {
        self.schedule(ctx, SoundSchedule::StartTime(TimePoint::PcmFrames(frames)))
    }

    pub fn set_start_time_in_milliseconds<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        ms: u64,
    ) -> WaveResult<()> {
        self.schedule(ctx, SoundSchedule::StartTime(TimePoint::Milliseconds(ms)))
    }

    pub fn set_stop_time_in_pcm_frames<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        frames: u64,
    ) -> WaveResult<()> {
        self.schedule(ctx, SoundSchedule::StopTime(TimePoint::PcmFrames(frames)))
    }

    pub fn set_stop_time_in_milliseconds<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        ms: u64,
    ) -> WaveResult<()> {
        self.schedule(ctx, SoundSchedule::StopTime(TimePoint::Milliseconds(ms)))
    }

    /// Stop at `stop`, fading out over the `fade` frames that end there.
    pub fn set_stop_time_with_fade_in_pcm_frames<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        stop: u64,
        fade: u64,
    ) -> WaveResult<()> {
        self.schedule(
            ctx,
            SoundSchedule::StopTimeWithFade {
                stop: TimePoint::PcmFrames(stop),
                fade: TimePoint::PcmFrames(fade),
            },
        )
    }

    pub fn set_stop_time_with_fade_in_milliseconds<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        stop: u64,
        fade: u64,
    ) -> WaveResult<()> {
        self.schedule(
            ctx,
            SoundSchedule::StopTimeWithFade {
                stop: TimePoint::Milliseconds(stop),
                fade: TimePoint::Milliseconds(fade),
            },
        )
    }

    /// Ramp volume from `from` to `to`. A negative `from` starts at the
    /// current fade volume.
    pub fn set_fade_in_pcm_frames<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        from: f32,
        to: f32,
        length: u64,
    ) -> WaveResult<()> {
        self.schedule(
            ctx,
            SoundSchedule::Fade {
                from,
                to,
                length: TimePoint::PcmFrames(length),
            },
        )
    }

    pub fn set_fade_in_milliseconds<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        from: f32,
        to: f32,
        length: u64,
    ) -> WaveResult<()> {
        self.schedule(
            ctx,
            SoundSchedule::Fade {
                from,
                to,
                length: TimePoint::Milliseconds(length),
            },
        )
    }

    fn schedule<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        schedule: SoundSchedule,
    ) -> WaveResult<()> {
        let result = ctx.parts_mut().and_then(|(adapter, registry)| {
            let record = registry.sound_mut(self.0)?;
            adapter.schedule(&mut record.instance, schedule).map_err(|e| {
                WaveError::adapter(format!("failed to schedule sound with ID: '{}'", self.0), e)
            })
        });
        ctx.record(result)
    }

    fn update<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        property: SoundProperty,
        write: impl FnOnce(&mut SoundParams),
    ) -> WaveResult<()> {
        let result = ctx.parts_mut().and_then(|(adapter, registry)| {
            let record = registry.sound_mut(self.0)?;
            adapter
                .set_property(&mut record.instance, property)
                .map_err(|e| {
                    WaveError::adapter(
                        format!("failed to set {} of sound with ID: '{}'", property.name(), self.0),
                        e,
                    )
                })?;
            write(&mut record.params);
            Ok(())
        });
        ctx.record(result)
    }

    fn param<A: AudioAdapter, T>(
        self,
        ctx: &Context<A>,
        read: impl FnOnce(&SoundParams) -> T,
    ) -> WaveResult<T> {
        self.read(ctx, |r| read(&r.params))
    }

    fn read<A: AudioAdapter, T>(
        self,
        ctx: &Context<A>,
        read: impl FnOnce(&SoundRecord<A::Sound>) -> T,
    ) -> WaveResult<T> {
        let result = ctx.registry().and_then(|r| r.sound(self.0)).map(read);
        ctx.record(result)
    }

    fn query<A: AudioAdapter, T>(
        self,
        ctx: &Context<A>,
        what: &str,
        query: impl FnOnce(&A, &A::Sound) -> anyhow::Result<T>,
    ) -> WaveResult<T> {
        let result = ctx.registry().and_then(|r| r.sound(self.0)).and_then(|record| {
            query(ctx.adapter(), &record.instance).map_err(|e| {
                WaveError::adapter(format!("failed to query {what} of sound with ID: '{}'", self.0), e)
            })
        });
        ctx.record(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextSettings;
    use crate::headless::{HeadlessAdapter, HeadlessOp};

    fn ready() -> (Context<HeadlessAdapter>, Engine, Sound) {
        let adapter = HeadlessAdapter::new().with_source("clip.wav", 48_000, 96_000);
        let mut ctx = Context::new(adapter);
        ctx.init(&ContextSettings::default()).expect("init");
        let engine = ctx.create_engine().unwrap();
        let sound = ctx.create_sound_from_file(engine, "clip.wav").unwrap();
        (ctx, engine, sound)
    }

    #[test]
    fn fresh_sound_is_stopped_with_defaults() {
        let (ctx, engine, sound) = ready();
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
        assert_eq!(sound.engine(&ctx), Ok(engine));
        assert_eq!(sound.params(&ctx), Ok(SoundParams::default()));
        assert_eq!(sound.length_in_pcm_frames(&ctx), Ok(96_000));
        assert_eq!(sound.length_in_seconds(&ctx), Ok(2.0));
    }

    #[test]
    fn play_pause_play_cycle() {
        let (mut ctx, engine, sound) = ready();
        engine.start(&mut ctx).unwrap();

        sound.play(&mut ctx).unwrap();
        assert_eq!(sound.state(&ctx), Ok(SoundState::Playing));
        ctx.adapter_mut().advance(4_800);

        sound.pause(&mut ctx).unwrap();
        assert_eq!(sound.state(&ctx), Ok(SoundState::Paused));
        ctx.adapter_mut().advance(4_800);
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(4_800));

        sound.play(&mut ctx).unwrap();
        assert_eq!(sound.state(&ctx), Ok(SoundState::Playing));
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(4_800));
    }

    #[test]
    fn play_twice_starts_adapter_once() {
        let (mut ctx, _, sound) = ready();
        sound.play(&mut ctx).unwrap();
        sound.play(&mut ctx).unwrap();
        let instance = ctx.adapter_sound(sound).unwrap();
        assert_eq!(ctx.adapter().sound(instance).unwrap().start_calls, 1);
    }

    #[test]
    fn play_after_natural_end_starts_over() {
        let adapter = HeadlessAdapter::new().with_source("short.wav", 48_000, 1_000);
        let mut ctx = Context::new(adapter);
        ctx.init(&ContextSettings::default()).expect("init");
        let engine = ctx.create_engine().unwrap();
        let sound = ctx.create_sound_from_file(engine, "short.wav").unwrap();
        engine.start(&mut ctx).unwrap();

        sound.play(&mut ctx).unwrap();
        ctx.adapter_mut().advance(2_000);
        assert_eq!(sound.is_at_end(&ctx), Ok(true));
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
        assert_eq!(sound.is_playing(&ctx), Ok(false));

        sound.play(&mut ctx).unwrap();
        ctx.adapter_mut().advance(100);
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(100));
        assert_eq!(sound.state(&ctx), Ok(SoundState::Playing));
        let instance = ctx.adapter_sound(sound).unwrap();
        assert_eq!(ctx.adapter().sound(instance).unwrap().start_calls, 2);
    }

    #[test]
    fn scheduled_stop_settles_to_stopped() {
        let (mut ctx, engine, sound) = ready();
        engine.start(&mut ctx).unwrap();
        sound.set_stop_time_in_pcm_frames(&mut ctx, 500).unwrap();
        sound.play(&mut ctx).unwrap();
        ctx.adapter_mut().advance(1_000);
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));

        sound.pause(&mut ctx).unwrap();
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(500));
    }

    #[test]
    fn pause_from_stopped_is_noop() {
        let (mut ctx, _, sound) = ready();
        sound.pause(&mut ctx).expect("pause");
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
    }

    #[test]
    fn stop_rewinds_cursor() {
        let (mut ctx, engine, sound) = ready();
        engine.start(&mut ctx).unwrap();
        sound.play(&mut ctx).unwrap();
        ctx.adapter_mut().advance(1_000);
        sound.stop(&mut ctx).unwrap();
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(0));
        assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
    }

    #[test]
    fn restart_rewinds_only_while_playing() {
        let (mut ctx, engine, sound) = ready();
        engine.start(&mut ctx).unwrap();
        sound.seek_to_pcm_frame(&mut ctx, 500).unwrap();
        sound.restart(&mut ctx).unwrap();
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(500));

        sound.play(&mut ctx).unwrap();
        sound.restart(&mut ctx).unwrap();
        assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(0));
        assert_eq!(sound.state(&ctx), Ok(SoundState::Playing));
    }

    #[test]
    fn cone_round_trips_in_degrees() {
        let (mut ctx, _, sound) = ready();
        let cone = AudioCone {
            inner_angle: 45.0,
            outer_angle: 90.0,
            outer_gain: 0.3,
        };
        sound.set_cone(&mut ctx, cone).unwrap();
        assert_eq!(sound.cone(&ctx), Ok(cone));

        let instance = ctx.adapter_sound(sound).unwrap();
        let (inner, outer) = ctx.adapter().sound(instance).unwrap().cone_radians;
        assert!((inner - std::f32::consts::FRAC_PI_4).abs() < 1e-6);
        assert!((outer - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn rejected_setter_keeps_shadow() {
        let (mut ctx, _, sound) = ready();
        let err = sound.set_volume(&mut ctx, f32::NAN).unwrap_err();
        assert!(err.to_string().starts_with("failed to set volume"));
        assert_eq!(sound.volume(&ctx), Ok(1.0));

        ctx.adapter_mut().fail_on(HeadlessOp::SetProperty);
        assert!(sound.set_pitch(&mut ctx, 2.0).is_err());
        assert_eq!(sound.pitch(&ctx), Ok(1.0));
    }

    #[test]
    fn cursor_and_time_units() {
        let (mut ctx, engine, sound) = ready();
        engine.start(&mut ctx).unwrap();
        sound.play(&mut ctx).unwrap();
        ctx.adapter_mut().advance(24_000);
        assert_eq!(sound.cursor_in_seconds(&ctx), Ok(0.5));
        assert_eq!(sound.sound_cursor(&ctx), Ok(0.5));
        assert_eq!(sound.time_in_milliseconds(&ctx), Ok(500));
    }

    #[test]
    fn destroyed_sound_rejects_every_accessor() {
        let (mut ctx, _, sound) = ready();
        ctx.destroy_sound(sound).unwrap();
        assert!(matches!(sound.volume(&ctx), Err(WaveError::InvalidHandle { .. })));
        assert!(matches!(sound.play(&mut ctx), Err(WaveError::InvalidHandle { .. })));
        assert!(matches!(
            sound.cursor_in_pcm_frames(&ctx),
            Err(WaveError::InvalidHandle { .. })
        ));
    }
}
