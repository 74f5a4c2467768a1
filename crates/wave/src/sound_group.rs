//! Sound groups: ordered trees of sounds driven as one.

use crate::adapter::AudioAdapter;
use crate::context::{Context, Registry};
use crate::engine::Engine;
use crate::error::{ResourceKind, WaveError, WaveResult};
use crate::id::Id;
use crate::sound::{Sound, Transport, apply_transport};

/// Entry in a group's ordered member list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupMember {
    Sound(Sound),
    Group(SoundGroup),
}

pub(crate) struct SoundGroupRecord {
    pub(crate) engine: Id,
    pub(crate) parent: Option<Id>,
    pub(crate) members: Vec<GroupMember>,
    pub(crate) is_paused: bool,
}

impl SoundGroupRecord {
    pub(crate) fn new(engine: Id, parent: Option<Id>) -> Self {
        Self {
            engine,
            parent,
            members: Vec::new(),
            is_paused: false,
        }
    }
}

/// Handle to a sound group owned by a [`Context`].
///
/// Transport commands reach every member sound first, then every sub-group
/// (depth-first, insertion order). The group's paused flag reflects the
/// last group-level command only; pausing a member sound directly does not
/// change it.
///
/// A command that fails on one member stops there. The group and the
/// members already reached keep their new state, and the error is returned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SoundGroup(Id);

impl SoundGroup {
    pub const INVALID: SoundGroup = SoundGroup(Id::INVALID);

    pub(crate) const fn from_id(id: Id) -> Self {
        Self(id)
    }

    pub fn id(self) -> Id {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self.0.is_valid()
    }

    pub fn play<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Play)
    }

    pub fn pause<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Pause)
    }

    pub fn stop<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Stop)
    }

    pub fn restart<A: AudioAdapter>(self, ctx: &mut Context<A>) -> WaveResult<()> {
        self.transport(ctx, Transport::Restart)
    }

    fn transport<A: AudioAdapter>(self, ctx: &mut Context<A>, command: Transport) -> WaveResult<()> {
        let result = ctx
            .parts_mut()
            .and_then(|(adapter, registry)| drive(adapter, registry, self.0, command));
        ctx.record(result)
    }

    /// Move `sound` into this group, leaving any group it was in before.
    pub fn add_sound<A: AudioAdapter>(self, ctx: &mut Context<A>, sound: Sound) -> WaveResult<()> {
        let result = self.add_sound_inner(ctx, sound);
        ctx.record(result)
    }

    fn add_sound_inner<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        sound: Sound,
    ) -> WaveResult<()> {
        let (_, registry) = ctx.parts_mut()?;
        let engine = registry.group(self.0)?.engine;
        let record = registry.sound(sound.id())?;
        if record.engine != engine {
            return Err(WaveError::EngineMismatch {
                kind: ResourceKind::Sound,
                id: sound.id(),
                expected: engine,
                actual: record.engine,
            });
        }

        let current = record.group;
        match current {
            Some(current) if current == self.0 => return Ok(()),
            Some(previous) => {
                if let Some(previous) = registry.groups.get_mut(previous) {
                    previous.members.retain(|m| *m != GroupMember::Sound(sound));
                }
            }
            None => {}
        }

        registry.sound_mut(sound.id())?.group = Some(self.0);
        registry
            .group_mut(self.0)?
            .members
            .push(GroupMember::Sound(sound));
        tracing::debug!(group = %self.0, sound = %sound.id(), "sound added to group");
        Ok(())
    }

    /// Take `sound` out of this group.
    ///
    /// Returns `false` when the sound was not a member.
    pub fn remove_sound<A: AudioAdapter>(
        self,
        ctx: &mut Context<A>,
        sound: Sound,
    ) -> WaveResult<bool> {
        let result = ctx.parts_mut().and_then(|(_, registry)| {
            if !registry.groups.contains(self.0) {
                return Err(WaveError::invalid(ResourceKind::SoundGroup, self.0));
            }
            let record = registry.sound_mut(sound.id())?;
            if record.group != Some(self.0) {
                return Ok(false);
            }
            record.group = None;
            registry
                .group_mut(self.0)?
                .members
                .retain(|m| *m != GroupMember::Sound(sound));
            tracing::debug!(group = %self.0, sound = %sound.id(), "sound removed from group");
            Ok(true)
        });
        ctx.record(result)
    }

    pub fn engine<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Engine> {
        self.read(ctx, |g| Engine::from_id(g.engine))
    }

    pub fn parent<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Option<SoundGroup>> {
        self.read(ctx, |g| g.parent.map(SoundGroup::from_id))
    }

    /// Member sounds and sub-groups in insertion order.
    pub fn members<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<Vec<GroupMember>> {
        self.read(ctx, |g| g.members.clone())
    }

    pub fn is_paused<A: AudioAdapter>(self, ctx: &Context<A>) -> WaveResult<bool> {
        self.read(ctx, |g| g.is_paused)
    }

    fn read<A: AudioAdapter, T>(
        self,
        ctx: &Context<A>,
        read: impl FnOnce(&SoundGroupRecord) -> T,
    ) -> WaveResult<T> {
        let result = ctx.registry().and_then(|r| r.group(self.0)).map(read);
        ctx.record(result)
    }
}

fn drive<A: AudioAdapter>(
    adapter: &mut A,
    registry: &mut Registry<A>,
    group: Id,
    command: Transport,
) -> WaveResult<()> {
    let record = registry.group_mut(group)?;
    record.is_paused = command == Transport::Pause;
    let members = record.members.clone();

    for member in &members {
        if let GroupMember::Sound(sound) = member {
            let record = registry.sound_mut(sound.id())?;
            apply_transport(adapter, sound.id(), record, command)?;
        }
    }
    for member in &members {
        if let GroupMember::Group(child) = member {
            drive(adapter, registry, child.id(), command)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContextSettings;
    use crate::headless::{HeadlessAdapter, HeadlessOp};
    use crate::sound::SoundState;

    fn ready() -> (Context<HeadlessAdapter>, Engine) {
        let adapter = HeadlessAdapter::new()
            .with_source("a.wav", 48_000, 48_000)
            .with_source("b.wav", 48_000, 48_000);
        let mut ctx = Context::new(adapter);
        ctx.init(&ContextSettings::default()).expect("init");
        let engine = ctx.create_engine().unwrap();
        (ctx, engine)
    }

    #[test]
    fn transport_reaches_nested_members() {
        let (mut ctx, engine) = ready();
        let root = ctx.create_sound_group(engine, None).unwrap();
        let child = ctx.create_sound_group(engine, Some(root)).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();
        let b = ctx.create_sound_from_file(engine, "b.wav").unwrap();
        root.add_sound(&mut ctx, a).unwrap();
        child.add_sound(&mut ctx, b).unwrap();

        root.play(&mut ctx).unwrap();
        assert_eq!(a.state(&ctx), Ok(SoundState::Playing));
        assert_eq!(b.state(&ctx), Ok(SoundState::Playing));

        root.pause(&mut ctx).unwrap();
        assert_eq!(b.state(&ctx), Ok(SoundState::Paused));
        assert_eq!(root.is_paused(&ctx), Ok(true));
        assert_eq!(child.is_paused(&ctx), Ok(true));

        root.stop(&mut ctx).unwrap();
        assert_eq!(a.state(&ctx), Ok(SoundState::Stopped));
        assert_eq!(root.is_paused(&ctx), Ok(false));
    }

    #[test]
    fn failed_member_leaves_group_state_consistent() {
        let (mut ctx, engine) = ready();
        let root = ctx.create_sound_group(engine, None).unwrap();
        let child = ctx.create_sound_group(engine, Some(root)).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();
        let b = ctx.create_sound_from_file(engine, "b.wav").unwrap();
        root.add_sound(&mut ctx, a).unwrap();
        child.add_sound(&mut ctx, b).unwrap();
        root.play(&mut ctx).unwrap();
        root.pause(&mut ctx).unwrap();

        ctx.adapter_mut().fail_on(HeadlessOp::SeekSound);
        assert!(root.stop(&mut ctx).is_err());
        assert_eq!(root.is_paused(&ctx), Ok(false));
        assert_eq!(a.state(&ctx), Ok(SoundState::Stopped));
        assert_eq!(child.is_paused(&ctx), Ok(true));
        assert_eq!(b.state(&ctx), Ok(SoundState::Paused));

        ctx.adapter_mut().clear_failures();
        root.stop(&mut ctx).unwrap();
        assert_eq!(child.is_paused(&ctx), Ok(false));
        assert_eq!(b.state(&ctx), Ok(SoundState::Stopped));
    }

    #[test]
    fn members_keep_insertion_order() {
        let (mut ctx, engine) = ready();
        let root = ctx.create_sound_group(engine, None).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();
        let child = ctx.create_sound_group(engine, Some(root)).unwrap();
        root.add_sound(&mut ctx, a).unwrap();

        assert_eq!(
            root.members(&ctx),
            Ok(vec![GroupMember::Group(child), GroupMember::Sound(a)])
        );
        assert_eq!(child.parent(&ctx), Ok(Some(root)));
    }

    #[test]
    fn sound_moves_between_groups() {
        let (mut ctx, engine) = ready();
        let first = ctx.create_sound_group(engine, None).unwrap();
        let second = ctx.create_sound_group(engine, None).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();

        first.add_sound(&mut ctx, a).unwrap();
        second.add_sound(&mut ctx, a).unwrap();
        assert_eq!(first.members(&ctx), Ok(vec![]));
        assert_eq!(a.group(&ctx), Ok(Some(second)));

        assert_eq!(first.remove_sound(&mut ctx, a), Ok(false));
        assert_eq!(second.remove_sound(&mut ctx, a), Ok(true));
        assert_eq!(a.group(&ctx), Ok(None));
    }

    #[test]
    fn sound_from_other_engine_is_rejected() {
        let (mut ctx, engine) = ready();
        let other = ctx.create_engine().unwrap();
        let group = ctx.create_sound_group(engine, None).unwrap();
        let a = ctx.create_sound_from_file(other, "a.wav").unwrap();

        let err = group.add_sound(&mut ctx, a).unwrap_err();
        assert!(matches!(err, WaveError::EngineMismatch { .. }));
    }

    #[test]
    fn destroy_order_for_groups() {
        let (mut ctx, engine) = ready();
        let root = ctx.create_sound_group(engine, None).unwrap();
        let child = ctx.create_sound_group(engine, Some(root)).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();
        root.add_sound(&mut ctx, a).unwrap();

        assert_eq!(
            ctx.destroy_sound_group(root),
            Err(WaveError::GroupHasSubgroups {
                group: root.id(),
                subgroups: 1,
            })
        );
        ctx.destroy_sound_group(child).unwrap();
        assert_eq!(root.members(&ctx), Ok(vec![GroupMember::Sound(a)]));

        ctx.destroy_sound_group(root).unwrap();
        assert_eq!(a.group(&ctx), Ok(None));
        assert_eq!(a.state(&ctx), Ok(SoundState::Stopped));
    }

    #[test]
    fn destroying_sound_detaches_it() {
        let (mut ctx, engine) = ready();
        let group = ctx.create_sound_group(engine, None).unwrap();
        let a = ctx.create_sound_from_file(engine, "a.wav").unwrap();
        group.add_sound(&mut ctx, a).unwrap();
        ctx.destroy_sound(a).unwrap();
        assert_eq!(group.members(&ctx), Ok(vec![]));
        group.play(&mut ctx).expect("empty group plays");
    }
}
