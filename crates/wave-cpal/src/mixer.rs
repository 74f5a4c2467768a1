//! Software mixer shared between the control side and the output callback.
//!
//! Every sound of an engine is a [`Voice`] holding its engine-rate samples.
//! The callback calls [`Mixer::render`]; the adapter mutates voices under the
//! same mutex. Rendered: volume, pitch, pan (balance or true pan), looping,
//! fades, scheduled start/stop and distance attenuation against a listener
//! at the origin.

use std::collections::HashMap;
use std::sync::Arc;

use wave::{AttenuationModel, PanMode, SoundParams, Timeline, Vec3};

/// One playable sound.
#[derive(Clone, Debug)]
pub struct Voice {
    samples: Arc<[f32]>,
    channels: usize,
    frames: u64,
    position: f64,
    pub playing: bool,
    pub at_end: bool,
    pub params: SoundParams,
    pub timeline: Timeline,
}

impl Voice {
    pub fn new(samples: Arc<[f32]>, channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = (samples.len() / channels) as u64;
        Self {
            samples,
            channels,
            frames,
            position: 0.0,
            playing: false,
            at_end: false,
            params: SoundParams::default(),
            timeline: Timeline::default(),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn cursor(&self) -> u64 {
        self.position as u64
    }

    /// Start advancing; a voice sitting at its end starts over.
    pub fn start(&mut self) {
        if self.at_end {
            self.position = 0.0;
            self.at_end = false;
        }
        self.playing = true;
    }

    pub fn seek(&mut self, frame: u64) {
        let frame = frame.min(self.frames);
        self.position = frame as f64;
        self.at_end = self.frames > 0 && frame == self.frames;
    }

    /// Stereo frame at the cursor, linearly interpolated.
    fn frame_at(&self, position: f64) -> (f32, f32) {
        let index = position as usize;
        let frac = (position - index as f64) as f32;
        let a = self.stereo(index);
        let b = if self.params.looping && index + 1 >= self.frames as usize {
            self.stereo(0)
        } else {
            self.stereo(index + 1)
        };
        (a.0 + (b.0 - a.0) * frac, a.1 + (b.1 - a.1) * frac)
    }

    fn stereo(&self, frame: usize) -> (f32, f32) {
        let start = frame * self.channels;
        if start >= self.samples.len() {
            return (0.0, 0.0);
        }
        let left = self.samples[start];
        let right = if self.channels > 1 {
            self.samples[start + 1]
        } else {
            left
        };
        (left, right)
    }
}

/// All voices of one engine plus the engine clock.
pub struct Mixer {
    voices: HashMap<u64, Voice>,
    out_channels: usize,
    sample_rate: u32,
    clock: u64,
    scratch: Vec<(f32, f32)>,
}

impl Mixer {
    pub fn new(sample_rate: u32, out_channels: usize) -> Self {
        Self {
            voices: HashMap::new(),
            out_channels: out_channels.max(1),
            sample_rate,
            clock: 0,
            scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Engine time in frames rendered so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn insert(&mut self, key: u64, voice: Voice) {
        self.voices.insert(key, voice);
    }

    pub fn remove(&mut self, key: u64) -> Option<Voice> {
        self.voices.remove(&key)
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, key: u64) -> Option<&Voice> {
        self.voices.get(&key)
    }

    pub fn voice_mut(&mut self, key: u64) -> Option<&mut Voice> {
        self.voices.get_mut(&key)
    }

    /// Mix every playing voice into `out` (interleaved, `out_channels` wide)
    /// and advance the clock by the number of frames written.
    pub fn render(&mut self, out: &mut [f32]) {
        let frames = out.len() / self.out_channels;
        out.fill(0.0);
        self.scratch.clear();
        self.scratch.resize(frames, (0.0, 0.0));

        for voice in self.voices.values_mut() {
            mix_voice(voice, self.clock, &mut self.scratch);
        }

        for (frame, (left, right)) in self.scratch.iter().enumerate() {
            let base = frame * self.out_channels;
            if self.out_channels == 1 {
                out[base] = 0.5 * (left + right);
            } else {
                out[base] = *left;
                out[base + 1] = *right;
            }
        }
        self.clock += frames as u64;
    }
}

fn mix_voice(voice: &mut Voice, clock: u64, acc: &mut [(f32, f32)]) {
    if !voice.playing {
        return;
    }
    let params = voice.params;
    let gain = params.volume * spatial_gain(&params);
    let (pan_left, pan_right) = pan_gains(params.pan);

    for (offset, slot) in acc.iter_mut().enumerate() {
        let now = clock + offset as u64;
        if voice.timeline.take_stop(now) {
            voice.playing = false;
            break;
        }
        if voice.timeline.is_waiting(now) {
            continue;
        }
        if voice.frames == 0 {
            voice.playing = false;
            voice.at_end = true;
            break;
        }

        let (left, right) = voice.frame_at(voice.position);
        let fade = voice.timeline.fade_volume(now);
        let (left, right) = apply_pan(left, right, pan_left, pan_right, params.pan_mode);
        slot.0 += left * gain * fade;
        slot.1 += right * gain * fade;

        voice.position += f64::from(params.pitch);
        let length = voice.frames as f64;
        if voice.position >= length {
            if params.looping {
                voice.position %= length;
            } else {
                voice.position = length;
                voice.playing = false;
                voice.at_end = true;
                break;
            }
        }
    }
}

/// Distance gain for spatialized voices, clamped to the min/max gain.
pub fn spatial_gain(params: &SoundParams) -> f32 {
    if !params.spatialized {
        return 1.0;
    }
    let distance = params.position.length();
    let gain = attenuation(
        params.attenuation_model,
        distance,
        params.min_distance,
        params.max_distance,
        params.falloff,
    ) * directional_gain(params);
    gain.clamp(params.min_gain, params.max_gain.max(params.min_gain))
}

/// Cone gain scaled by the directional attenuation factor.
///
/// Cone angles are full apertures in degrees around the sound's direction.
pub fn directional_gain(params: &SoundParams) -> f32 {
    let cone = params.cone;
    let facing = params.direction.normalized();
    let to_listener = direction_to_listener(params.position);
    if facing == Vec3::ZERO || to_listener == Vec3::ZERO {
        return 1.0;
    }
    let dot = facing.x * to_listener.x + facing.y * to_listener.y + facing.z * to_listener.z;
    let angle = dot.clamp(-1.0, 1.0).acos().to_degrees();
    let inner = cone.inner_angle * 0.5;
    let outer = (cone.outer_angle * 0.5).max(inner);
    let gain = if angle <= inner {
        1.0
    } else if angle >= outer {
        cone.outer_gain
    } else {
        let t = (angle - inner) / (outer - inner);
        1.0 + (cone.outer_gain - 1.0) * t
    };
    1.0 + (gain - 1.0) * params.directional_attenuation_factor
}

pub fn attenuation(model: AttenuationModel, distance: f32, min: f32, max: f32, falloff: f32) -> f32 {
    if min >= max {
        return 1.0;
    }
    let d = distance.clamp(min, max);
    match model {
        AttenuationModel::None => 1.0,
        AttenuationModel::Inverse => min / (min + falloff * (d - min)),
        AttenuationModel::Linear => 1.0 - falloff * (d - min) / (max - min),
        AttenuationModel::Exponential => {
            if min <= 0.0 {
                1.0
            } else {
                (d / min).powf(-falloff)
            }
        }
    }
}

/// Per-side factors for a pan position in `-1.0..=1.0`.
pub fn pan_gains(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan < 0.0 {
        (1.0, 1.0 + pan)
    } else {
        (1.0 - pan, 1.0)
    }
}

fn apply_pan(left: f32, right: f32, pan_left: f32, pan_right: f32, mode: PanMode) -> (f32, f32) {
    match mode {
        PanMode::Balance => (left * pan_left, right * pan_right),
        // True pan folds the attenuated side into the other one.
        PanMode::Pan => (
            left * pan_left + right * (1.0 - pan_right),
            right * pan_right + left * (1.0 - pan_left),
        ),
    }
}

/// Unit vector from the voice toward a listener at the origin.
pub fn direction_to_listener(position: Vec3) -> Vec3 {
    (-position).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave::{SoundSchedule, TimePoint};

    fn dc_voice(level: f32, frames: usize) -> Voice {
        let mut voice = Voice::new(Arc::from(vec![level; frames * 2]), 2);
        voice.params.spatialized = false;
        voice
    }

    #[test]
    fn render_mixes_and_advances_clock() {
        let mut mixer = Mixer::new(48_000, 2);
        let mut voice = dc_voice(0.25, 100);
        voice.start();
        mixer.insert(1, voice.clone());
        mixer.insert(2, voice);

        let mut out = vec![0.0f32; 20];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| (*s - 0.5).abs() < 1e-6));
        assert_eq!(mixer.clock(), 10);
        assert_eq!(mixer.voice(1).unwrap().cursor(), 10);
    }

    #[test]
    fn non_looping_voice_stops_at_end() {
        let mut mixer = Mixer::new(48_000, 1);
        let mut voice = dc_voice(1.0, 4);
        voice.start();
        mixer.insert(7, voice);

        let mut out = vec![0.0f32; 8];
        mixer.render(&mut out);
        assert_eq!(&out[4..], &[0.0; 4]);
        let voice = mixer.voice(7).unwrap();
        assert!(voice.at_end && !voice.playing);
        assert_eq!(voice.cursor(), 4);
    }

    #[test]
    fn looping_voice_wraps() {
        let mut mixer = Mixer::new(48_000, 2);
        let mut voice = dc_voice(1.0, 4);
        voice.params.looping = true;
        voice.start();
        mixer.insert(1, voice);

        let mut out = vec![0.0f32; 2 * 6];
        mixer.render(&mut out);
        assert_eq!(mixer.voice(1).unwrap().cursor(), 2);
        assert!(mixer.voice(1).unwrap().playing);
    }

    #[test]
    fn scheduled_start_delays_output() {
        let mut mixer = Mixer::new(1_000, 1);
        let mut voice = dc_voice(1.0, 100);
        voice
            .timeline
            .apply(SoundSchedule::StartTime(TimePoint::PcmFrames(3)), 0, 1_000);
        voice.start();
        mixer.insert(1, voice);

        let mut out = vec![0.0f32; 5];
        mixer.render(&mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn balance_pan_attenuates_one_side() {
        let (l, r) = apply_pan(1.0, 1.0, 1.0, 0.25, PanMode::Balance);
        assert_eq!((l, r), (1.0, 0.25));
        assert_eq!(pan_gains(-0.75), (1.0, 0.25));
        assert_eq!(pan_gains(0.5), (0.5, 1.0));
    }

    #[test]
    fn true_pan_folds_signal_across() {
        let (pl, pr) = pan_gains(1.0);
        let (l, r) = apply_pan(1.0, 0.0, pl, pr, PanMode::Pan);
        assert_eq!(l, 0.0);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn attenuation_models() {
        assert_eq!(attenuation(AttenuationModel::None, 10.0, 1.0, 100.0, 1.0), 1.0);
        assert_eq!(attenuation(AttenuationModel::Inverse, 0.5, 1.0, 100.0, 1.0), 1.0);
        assert!((attenuation(AttenuationModel::Inverse, 4.0, 1.0, 100.0, 1.0) - 0.25).abs() < 1e-6);
        assert!((attenuation(AttenuationModel::Linear, 50.5, 1.0, 100.0, 1.0) - 0.5).abs() < 1e-6);
        assert!(
            (attenuation(AttenuationModel::Exponential, 2.0, 1.0, 100.0, 2.0) - 0.25).abs() < 1e-6
        );
    }

    #[test]
    fn spatial_gain_respects_gain_bounds() {
        let mut params = SoundParams::default();
        params.position = Vec3::new(0.0, 0.0, 1_000.0);
        params.min_gain = 0.1;
        assert!((spatial_gain(&params) - 0.1).abs() < 1e-6);

        params.spatialized = false;
        assert_eq!(spatial_gain(&params), 1.0);
    }

    #[test]
    fn cone_attenuates_behind_the_sound() {
        let mut params = SoundParams::default();
        params.position = Vec3::new(0.0, 0.0, -2.0);
        params.cone = wave::AudioCone {
            inner_angle: 90.0,
            outer_angle: 180.0,
            outer_gain: 0.25,
        };
        // Facing away from the listener at the origin.
        params.direction = Vec3::new(0.0, 0.0, -1.0);
        assert!((directional_gain(&params) - 0.25).abs() < 1e-6);

        params.direction = Vec3::new(0.0, 0.0, 1.0);
        assert!((directional_gain(&params) - 1.0).abs() < 1e-6);

        params.direction = Vec3::new(0.0, 0.0, -1.0);
        params.directional_attenuation_factor = 0.0;
        assert!((directional_gain(&params) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn direction_points_at_origin() {
        let dir = direction_to_listener(Vec3::new(3.0, 0.0, 4.0));
        assert!((dir.x + 0.6).abs() < 1e-6);
        assert!((dir.z + 0.8).abs() < 1e-6);
    }
}
