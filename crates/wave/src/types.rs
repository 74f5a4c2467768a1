//! Value types shared by the registry, the handles and the adapters.

use std::ops::{Neg, Sub};

/// Distance model used for spatialized sounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttenuationModel {
    None,
    #[default]
    Inverse,
    Linear,
    Exponential,
}

/// Stereo panner behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PanMode {
    /// Attenuates one side without blending. Matches most engines.
    #[default]
    Balance,
    /// True pan: one side is folded into the other.
    Pan,
}

/// Whether a sound's position is absolute or relative to the listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Positioning {
    #[default]
    Absolute,
    Relative,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::splat(0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(value: f32) -> Self {
        Self::new(value, value, value)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > 0.0 {
            Self::new(self.x / len, self.y / len, self.z / len)
        } else {
            Self::ZERO
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Directional gain envelope, angles in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioCone {
    pub inner_angle: f32,
    pub outer_angle: f32,
    pub outer_gain: f32,
}

impl Default for AudioCone {
    /// Omnidirectional: both angles cover the full circle.
    fn default() -> Self {
        Self {
            inner_angle: 360.0,
            outer_angle: 360.0,
            outer_gain: 0.0,
        }
    }
}

pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees.to_radians()
}

pub fn radians_to_degrees(radians: f32) -> f32 {
    radians.to_degrees()
}

/// Mutable acoustic state of a sound.
///
/// The registry keeps one of these per sound as its shadow copy. The
/// defaults are the values an engine gives a freshly created sound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoundParams {
    pub volume: f32,
    pub pitch: f32,
    pub doppler_factor: f32,
    pub position: Vec3,
    pub direction: Vec3,
    pub velocity: Vec3,
    pub cone: AudioCone,
    pub min_gain: f32,
    pub max_gain: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub falloff: f32,
    pub attenuation_model: AttenuationModel,
    pub directional_attenuation_factor: f32,
    pub pan: f32,
    pub pan_mode: PanMode,
    pub positioning: Positioning,
    pub looping: bool,
    pub spatialized: bool,
}

impl Default for SoundParams {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            doppler_factor: 1.0,
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, 0.0, -1.0),
            velocity: Vec3::ZERO,
            cone: AudioCone::default(),
            min_gain: 0.0,
            max_gain: 1.0,
            min_distance: 1.0,
            max_distance: f32::MAX,
            falloff: 1.0,
            attenuation_model: AttenuationModel::Inverse,
            directional_attenuation_factor: 1.0,
            pan: 0.0,
            pan_mode: PanMode::Balance,
            positioning: Positioning::Absolute,
            looping: false,
            spatialized: true,
        }
    }
}

impl SoundParams {
    /// Write a property as received by an adapter.
    ///
    /// Cone angles arrive in radians and are stored back in degrees.
    pub fn apply(&mut self, property: SoundProperty) {
        match property {
            SoundProperty::Volume(v) => self.volume = v,
            SoundProperty::Pitch(v) => self.pitch = v,
            SoundProperty::DopplerFactor(v) => self.doppler_factor = v,
            SoundProperty::Position(v) => self.position = v,
            SoundProperty::Direction(v) => self.direction = v,
            SoundProperty::Velocity(v) => self.velocity = v,
            SoundProperty::Cone {
                inner_radians,
                outer_radians,
                outer_gain,
            } => {
                self.cone = AudioCone {
                    inner_angle: radians_to_degrees(inner_radians),
                    outer_angle: radians_to_degrees(outer_radians),
                    outer_gain,
                }
            }
            SoundProperty::MinGain(v) => self.min_gain = v,
            SoundProperty::MaxGain(v) => self.max_gain = v,
            SoundProperty::MinDistance(v) => self.min_distance = v,
            SoundProperty::MaxDistance(v) => self.max_distance = v,
            SoundProperty::Falloff(v) => self.falloff = v,
            SoundProperty::AttenuationModel(v) => self.attenuation_model = v,
            SoundProperty::DirectionalAttenuationFactor(v) => {
                self.directional_attenuation_factor = v
            }
            SoundProperty::Pan(v) => self.pan = v,
            SoundProperty::PanMode(v) => self.pan_mode = v,
            SoundProperty::Positioning(v) => self.positioning = v,
            SoundProperty::Looping(v) => self.looping = v,
            SoundProperty::Spatialized(v) => self.spatialized = v,
        }
    }
}

/// A single property write forwarded to an adapter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SoundProperty {
    Volume(f32),
    Pitch(f32),
    DopplerFactor(f32),
    Position(Vec3),
    Direction(Vec3),
    Velocity(Vec3),
    /// Adapters work in radians.
    Cone {
        inner_radians: f32,
        outer_radians: f32,
        outer_gain: f32,
    },
    MinGain(f32),
    MaxGain(f32),
    MinDistance(f32),
    MaxDistance(f32),
    Falloff(f32),
    AttenuationModel(AttenuationModel),
    DirectionalAttenuationFactor(f32),
    Pan(f32),
    PanMode(PanMode),
    Positioning(Positioning),
    Looping(bool),
    Spatialized(bool),
}

impl SoundProperty {
    pub fn name(&self) -> &'static str {
        match self {
            SoundProperty::Volume(_) => "volume",
            SoundProperty::Pitch(_) => "pitch",
            SoundProperty::DopplerFactor(_) => "doppler factor",
            SoundProperty::Position(_) => "position",
            SoundProperty::Direction(_) => "direction",
            SoundProperty::Velocity(_) => "velocity",
            SoundProperty::Cone { .. } => "cone",
            SoundProperty::MinGain(_) => "min gain",
            SoundProperty::MaxGain(_) => "max gain",
            SoundProperty::MinDistance(_) => "min distance",
            SoundProperty::MaxDistance(_) => "max distance",
            SoundProperty::Falloff(_) => "falloff",
            SoundProperty::AttenuationModel(_) => "attenuation model",
            SoundProperty::DirectionalAttenuationFactor(_) => "directional attenuation factor",
            SoundProperty::Pan(_) => "pan",
            SoundProperty::PanMode(_) => "pan mode",
            SoundProperty::Positioning(_) => "positioning",
            SoundProperty::Looping(_) => "looping",
            SoundProperty::Spatialized(_) => "spatialized",
        }
    }

    /// `false` when any float payload is NaN or infinite.
    ///
    /// `MaxDistance(f32::MAX)` is finite and accepted.
    pub fn is_finite(&self) -> bool {
        match *self {
            SoundProperty::Volume(v)
            | SoundProperty::Pitch(v)
            | SoundProperty::DopplerFactor(v)
            | SoundProperty::MinGain(v)
            | SoundProperty::MaxGain(v)
            | SoundProperty::MinDistance(v)
            | SoundProperty::MaxDistance(v)
            | SoundProperty::Falloff(v)
            | SoundProperty::DirectionalAttenuationFactor(v)
            | SoundProperty::Pan(v) => v.is_finite(),
            SoundProperty::Position(v) | SoundProperty::Direction(v) | SoundProperty::Velocity(v) => {
                v.is_finite()
            }
            SoundProperty::Cone {
                inner_radians,
                outer_radians,
                outer_gain,
            } => inner_radians.is_finite() && outer_radians.is_finite() && outer_gain.is_finite(),
            SoundProperty::AttenuationModel(_)
            | SoundProperty::PanMode(_)
            | SoundProperty::Positioning(_)
            | SoundProperty::Looping(_)
            | SoundProperty::Spatialized(_) => true,
        }
    }
}

/// A point on a sound's timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimePoint {
    PcmFrames(u64),
    Milliseconds(u64),
}

impl TimePoint {
    /// Resolve to PCM frames at `sample_rate`.
    pub fn to_pcm_frames(self, sample_rate: u32) -> u64 {
        match self {
            TimePoint::PcmFrames(frames) => frames,
            TimePoint::Milliseconds(ms) => ms.saturating_mul(u64::from(sample_rate)) / 1000,
        }
    }
}

/// Future adapter-driven events. These carry no shadow state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SoundSchedule {
    StartTime(TimePoint),
    StopTime(TimePoint),
    StopTimeWithFade { stop: TimePoint, fade: TimePoint },
    /// A negative `from` starts at the current fade volume.
    Fade { from: f32, to: f32, length: TimePoint },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Playback,
    Capture,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceType,
    pub is_default: bool,
}

/// Devices reported by an adapter, split by direction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceLists {
    pub playback: Vec<DeviceInfo>,
    pub capture: Vec<DeviceInfo>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Debug,
}
