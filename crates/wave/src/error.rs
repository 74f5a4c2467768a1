//! Registry error types

use thiserror::Error;

use crate::id::Id;

/// Kind of registry entry an [`Id`] was expected to name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Engine,
    Sound,
    SoundGroup,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceKind::Engine => "engine",
            ResourceKind::Sound => "sound",
            ResourceKind::SoundGroup => "sound group",
        };
        f.write_str(name)
    }
}

/// Errors returned by [`Context`](crate::Context) and the resource handles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaveError {
    /// Operation issued before `init` or after `shutdown`.
    #[error("audio context is not initialized")]
    NotInitialized,

    #[error("audio context is already initialized")]
    AlreadyInitialized,

    /// Handle was never created, or its resource has been destroyed.
    #[error("invalid {kind} ID: '{id}'")]
    InvalidHandle { kind: ResourceKind, id: Id },

    #[error("no free {0} IDs left")]
    IdSpaceExhausted(ResourceKind),

    #[error("engine '{0}' is already running")]
    EngineAlreadyRunning(Id),

    #[error("engine '{0}' is not running")]
    EngineNotRunning(Id),

    /// Sounds or groups are still bound to the engine.
    #[error("engine '{engine}' still has {sounds} sound(s) and {groups} sound group(s) bound to it")]
    EngineHasDependents {
        engine: Id,
        sounds: usize,
        groups: usize,
    },

    #[error("engine '{engine}' cannot stop while {playing} bound sound(s) are playing")]
    EngineHasPlayingSounds { engine: Id, playing: usize },

    /// Two resources that must share an engine are bound to different ones.
    #[error("{kind} '{id}' is bound to engine '{actual}', expected engine '{expected}'")]
    EngineMismatch {
        kind: ResourceKind,
        id: Id,
        expected: Id,
        actual: Id,
    },

    #[error("sound group '{group}' still has {subgroups} sub-group(s)")]
    GroupHasSubgroups { group: Id, subgroups: usize },

    /// The underlying audio engine reported a failure.
    #[error("{op}: {message}")]
    Adapter { op: String, message: String },
}

impl WaveError {
    pub(crate) fn adapter(op: impl Into<String>, err: anyhow::Error) -> Self {
        WaveError::Adapter {
            op: op.into(),
            message: format!("{err:#}"),
        }
    }

    pub(crate) fn invalid(kind: ResourceKind, id: Id) -> Self {
        WaveError::InvalidHandle { kind, id }
    }

    /// Precondition violations (programmer bugs), as opposed to runtime
    /// failures reported by the audio engine.
    pub fn is_usage_error(&self) -> bool {
        !matches!(self, WaveError::Adapter { .. } | WaveError::IdSpaceExhausted(_))
    }
}

/// Result type for registry operations
pub type WaveResult<T> = Result<T, WaveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn adapter_error_flattens_context_chain() {
        let err = anyhow!("file not found").context("open clip.wav");
        let wave = WaveError::adapter("failed to create sound", err);
        assert_eq!(
            wave.to_string(),
            "failed to create sound: open clip.wav: file not found"
        );
        assert!(!wave.is_usage_error());
    }

    #[test]
    fn invalid_handle_is_usage_error() {
        let err = WaveError::invalid(ResourceKind::Sound, Id::INVALID);
        assert!(err.is_usage_error());
        assert_eq!(err.to_string(), "invalid sound ID: 'invalid'");
    }
}
