//! End-to-end registry behaviour through the public API.

use std::sync::{Arc, Mutex};

use wave::{
    AttenuationModel, AudioCone, Context, ContextSettings, GroupMember, HeadlessAdapter,
    HeadlessOp, LogLevel, PanMode, PlaybackDevice, Positioning, Sound, SoundState, Vec3,
    WaveError,
};

fn context() -> Context<HeadlessAdapter> {
    let adapter = HeadlessAdapter::new()
        .with_source("clip.wav", 48_000, 48_000)
        .with_source("loop.ogg", 22_050, 22_050);
    let mut ctx = Context::new(adapter);
    ctx.init(&ContextSettings::default()).expect("init");
    ctx
}

#[test]
fn engine_sound_volume_stop_scenario() {
    let mut ctx = context();

    let engine = ctx.create_engine().unwrap();
    let sound = ctx.create_sound_from_file(engine, "clip.wav").unwrap();
    assert_eq!(engine.id().generation(), 1);
    assert_eq!(sound.id().generation(), 1);

    engine.start(&mut ctx).unwrap();
    assert_eq!(engine.is_running(&ctx), Ok(true));

    sound.play(&mut ctx).unwrap();
    sound.set_volume(&mut ctx, 0.5).unwrap();
    assert_eq!(sound.volume(&ctx), Ok(0.5));

    ctx.adapter_mut().advance(12_000);
    sound.stop(&mut ctx).unwrap();
    assert_eq!(sound.sound_cursor(&ctx), Ok(0.0));
    assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));

    ctx.destroy_sound(sound).unwrap();
    engine.stop(&mut ctx).unwrap();
    ctx.destroy_engine(engine).unwrap();
    ctx.shutdown().unwrap();
}

#[test]
fn no_hardware_gives_empty_device_lists() {
    let mut ctx = Context::new(HeadlessAdapter::new());
    let settings = ContextSettings {
        enumerate_devices: true,
        ..Default::default()
    };
    let info = ctx.init(&settings).expect("init without hardware");
    assert!(info.playback_devices.is_empty());
    assert!(info.capture_devices.is_empty());
}

#[test]
fn every_live_sound_has_a_live_engine() {
    let mut ctx = context();
    let a = ctx.create_engine().unwrap();
    let b = ctx.create_engine().unwrap();
    let sounds: Vec<Sound> = [a, b, a]
        .into_iter()
        .map(|e| ctx.create_sound_from_file(e, "clip.wav").unwrap())
        .collect();

    for engine in [a, b] {
        assert!(matches!(
            ctx.destroy_engine(engine),
            Err(WaveError::EngineHasDependents { .. })
        ));
    }
    for sound in &sounds {
        let engine = sound.engine(&ctx).unwrap();
        assert_eq!(engine.is_running(&ctx), Ok(false));
    }

    for sound in sounds {
        ctx.destroy_sound(sound).unwrap();
    }
    ctx.destroy_engine(a).unwrap();
    ctx.destroy_engine(b).unwrap();
    assert_eq!(ctx.adapter().live_engines(), 0);
}

#[test]
fn setters_round_trip_through_getters() {
    let mut ctx = context();
    let engine = ctx.create_engine().unwrap();
    let sound = ctx.create_sound_from_file(engine, "loop.ogg").unwrap();

    sound.set_pitch(&mut ctx, 1.5).unwrap();
    sound.set_doppler_factor(&mut ctx, 0.25).unwrap();
    sound.set_position(&mut ctx, Vec3::new(1.0, 2.0, 3.0)).unwrap();
    sound.set_direction(&mut ctx, Vec3::new(0.0, 1.0, 0.0)).unwrap();
    sound.set_velocity(&mut ctx, Vec3::new(-4.0, 0.0, 0.5)).unwrap();
    sound
        .set_cone(
            &mut ctx,
            AudioCone {
                inner_angle: 30.0,
                outer_angle: 120.0,
                outer_gain: 0.1,
            },
        )
        .unwrap();
    sound.set_min_gain(&mut ctx, 0.1).unwrap();
    sound.set_max_gain(&mut ctx, 0.9).unwrap();
    sound.set_min_distance(&mut ctx, 2.0).unwrap();
    sound.set_max_distance(&mut ctx, 50.0).unwrap();
    sound.set_falloff(&mut ctx, 0.7).unwrap();
    sound
        .set_attenuation_model(&mut ctx, AttenuationModel::Exponential)
        .unwrap();
    sound.set_directional_attenuation_factor(&mut ctx, 0.3).unwrap();
    sound.set_pan(&mut ctx, -0.75).unwrap();
    sound.set_pan_mode(&mut ctx, PanMode::Pan).unwrap();
    sound.set_positioning(&mut ctx, Positioning::Relative).unwrap();
    sound.set_looping(&mut ctx, true).unwrap();
    sound.set_spatialized(&mut ctx, false).unwrap();

    assert_eq!(sound.pitch(&ctx), Ok(1.5));
    assert_eq!(sound.doppler_factor(&ctx), Ok(0.25));
    assert_eq!(sound.position(&ctx), Ok(Vec3::new(1.0, 2.0, 3.0)));
    assert_eq!(sound.direction(&ctx), Ok(Vec3::new(0.0, 1.0, 0.0)));
    assert_eq!(sound.velocity(&ctx), Ok(Vec3::new(-4.0, 0.0, 0.5)));
    assert_eq!(
        sound.cone(&ctx),
        Ok(AudioCone {
            inner_angle: 30.0,
            outer_angle: 120.0,
            outer_gain: 0.1,
        })
    );
    assert_eq!(sound.min_gain(&ctx), Ok(0.1));
    assert_eq!(sound.max_gain(&ctx), Ok(0.9));
    assert_eq!(sound.min_distance(&ctx), Ok(2.0));
    assert_eq!(sound.max_distance(&ctx), Ok(50.0));
    assert_eq!(sound.falloff(&ctx), Ok(0.7));
    assert_eq!(sound.attenuation_model(&ctx), Ok(AttenuationModel::Exponential));
    assert_eq!(sound.directional_attenuation_factor(&ctx), Ok(0.3));
    assert_eq!(sound.pan(&ctx), Ok(-0.75));
    assert_eq!(sound.pan_mode(&ctx), Ok(PanMode::Pan));
    assert_eq!(sound.positioning(&ctx), Ok(Positioning::Relative));
    assert_eq!(sound.is_looping(&ctx), Ok(true));
    assert_eq!(sound.is_spatialized(&ctx), Ok(false));
}

#[test]
fn live_queries_come_from_the_engine() {
    let mut ctx = context();
    let engine = ctx.create_engine().unwrap();
    let sound = ctx.create_sound_from_file(engine, "loop.ogg").unwrap();
    sound.set_position(&mut ctx, Vec3::new(0.0, 0.0, -5.0)).unwrap();
    assert_eq!(sound.direction_to_listener(&ctx), Ok(Vec3::new(0.0, 0.0, 1.0)));

    engine.start(&mut ctx).unwrap();
    sound.play(&mut ctx).unwrap();
    ctx.adapter_mut().advance(96_000);
    assert_eq!(sound.is_at_end(&ctx), Ok(true));
    assert_eq!(sound.cursor_in_pcm_frames(&ctx), Ok(22_050));
    assert_eq!(sound.time_in_milliseconds(&ctx), Ok(2_000));

    ctx.adapter_mut().fail_on(HeadlessOp::Query);
    let err = sound.cursor_in_pcm_frames(&ctx).unwrap_err();
    assert!(!err.is_usage_error());
}

#[test]
fn fade_schedules_reach_the_engine() {
    let mut ctx = context();
    let engine = ctx.create_engine().unwrap();
    let sound = ctx.create_sound_from_file(engine, "clip.wav").unwrap();
    engine.start(&mut ctx).unwrap();

    sound.set_fade_in_pcm_frames(&mut ctx, 0.0, 1.0, 1_000).unwrap();
    assert_eq!(sound.current_fade_volume(&ctx), Ok(0.0));
    ctx.adapter_mut().advance(500);
    assert_eq!(sound.current_fade_volume(&ctx), Ok(0.5));

    sound.set_stop_time_with_fade_in_milliseconds(&mut ctx, 100, 50).unwrap();
    sound.play(&mut ctx).unwrap();
    ctx.adapter_mut().advance(4_800);
    assert_eq!(sound.current_fade_volume(&ctx), Ok(0.0));

    // The engine stopped the sound on its own at the scheduled time.
    let instance = ctx.adapter_sound(sound).unwrap();
    assert!(!ctx.adapter().sound(instance).unwrap().playing);
    assert_eq!(sound.state(&ctx), Ok(SoundState::Stopped));
    engine.stop(&mut ctx).expect("nothing left playing");
}

#[test]
fn group_tree_is_driven_depth_first() {
    let mut ctx = context();
    let engine = ctx.create_engine().unwrap();
    let music = ctx.create_sound_group(engine, None).unwrap();
    let stingers = ctx.create_sound_group(engine, Some(music)).unwrap();
    let bed = ctx.create_sound_from_file(engine, "loop.ogg").unwrap();
    let hit = ctx.create_sound_from_file(engine, "clip.wav").unwrap();
    music.add_sound(&mut ctx, bed).unwrap();
    stingers.add_sound(&mut ctx, hit).unwrap();

    assert_eq!(
        music.members(&ctx),
        Ok(vec![GroupMember::Group(stingers), GroupMember::Sound(bed)])
    );

    engine.start(&mut ctx).unwrap();
    music.play(&mut ctx).unwrap();
    assert_eq!(hit.state(&ctx), Ok(SoundState::Playing));

    // A direct toggle does not touch the group flag.
    hit.pause(&mut ctx).unwrap();
    assert_eq!(stingers.is_paused(&ctx), Ok(false));

    music.pause(&mut ctx).unwrap();
    assert_eq!(bed.state(&ctx), Ok(SoundState::Paused));
    assert_eq!(stingers.is_paused(&ctx), Ok(true));

    music.restart(&mut ctx).unwrap();
    assert_eq!(music.is_paused(&ctx), Ok(false));
    assert_eq!(bed.state(&ctx), Ok(SoundState::Paused));
}

#[test]
fn playback_device_full_cycle() {
    let mut ctx = context();
    let device = PlaybackDevice::from_memory(&mut ctx, vec![0u8; 4 * 4_800]).unwrap();
    device.play(&mut ctx).unwrap();
    device.play(&mut ctx).unwrap();
    device.pause(&mut ctx).unwrap();
    device.restart(&mut ctx).unwrap();
    device.play(&mut ctx).unwrap();
    device.restart(&mut ctx).unwrap();
    device.stop(&mut ctx).unwrap();
    device.shutdown(&mut ctx).unwrap();
    assert_eq!(ctx.engine_count(), 0);
    assert_eq!(ctx.sound_count(), 0);
}

#[test]
fn contexts_are_independent() {
    let mut first = context();
    let mut second = context();
    let engine = first.create_engine().unwrap();
    second.create_engine().unwrap();

    first.destroy_engine(engine).unwrap();
    assert_eq!(first.engine_count(), 0);
    assert_eq!(second.engine_count(), 1);
}

#[test]
fn handles_resolve_by_id_in_any_context() {
    let mut first = context();
    let mut second = context();
    let engine = first.create_engine().unwrap();
    let other = second.create_engine().unwrap();

    // Both contexts issued the same id; the handle carries nothing else.
    assert_eq!(engine, other);
    engine.start(&mut second).unwrap();
    assert_eq!(other.is_running(&second), Ok(true));
    assert_eq!(engine.is_running(&first), Ok(false));
}

#[test]
fn custom_log_callback_receives_engine_messages() {
    let lines: Arc<Mutex<Vec<(LogLevel, String)>>> = Arc::default();
    let sink = Arc::clone(&lines);
    let settings = ContextSettings {
        enable_debug_logging: true,
        log_callback: Some(Arc::new(move |level, message| {
            sink.lock()
                .unwrap_or_else(|err| err.into_inner())
                .push((level, message.to_string()));
        })),
        ..Default::default()
    };

    let mut ctx = Context::new(HeadlessAdapter::new());
    ctx.init(&settings).unwrap();
    ctx.create_engine().unwrap();

    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, LogLevel::Debug);
    assert!(lines[0].1.contains("initialized at 48000 Hz"));
}
