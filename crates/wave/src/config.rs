//! Context and engine settings.

use std::fmt;
use std::sync::Arc;

use crate::types::LogLevel;

/// Receiver for log lines emitted by the audio engine.
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Settings applied by [`Context::init`](crate::Context::init).
#[derive(Clone, Default)]
pub struct ContextSettings {
    /// Return the playback/capture device lists from `init`.
    pub enumerate_devices: bool,
    /// Register a log callback with the audio engine.
    pub enable_debug_logging: bool,
    /// Callback to register. Falls back to [`tracing_log_callback`].
    pub log_callback: Option<LogCallback>,
    /// Configuration used for every engine created by the context.
    pub engine: EngineConfig,
}

impl fmt::Debug for ContextSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSettings")
            .field("enumerate_devices", &self.enumerate_devices)
            .field("enable_debug_logging", &self.enable_debug_logging)
            .field("log_callback", &self.log_callback.is_some())
            .field("engine", &self.engine)
            .finish()
    }
}

/// Engine construction parameters.
///
/// Engines are always created stopped; `Engine::start` begins output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Output device by substring match. `None` selects the default device.
    pub device: Option<String>,
    /// Preferred output sample rate in Hz.
    pub sample_rate: Option<u32>,
    /// Preferred output channel count.
    pub channels: Option<u16>,
}

/// Log callback that re-emits engine messages as `tracing` events.
pub fn tracing_log_callback() -> LogCallback {
    Arc::new(|level, message| match level {
        LogLevel::Error => tracing::error!(target: "wave::adapter", "{message}"),
        LogLevel::Warning => tracing::warn!(target: "wave::adapter", "{message}"),
        LogLevel::Info => tracing::info!(target: "wave::adapter", "{message}"),
        LogLevel::Debug => tracing::debug!(target: "wave::adapter", "{message}"),
    })
}
