//! Adapter configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tuning for [`CpalAdapter`](crate::CpalAdapter), loadable from TOML.
///
/// Engine settings passed through the registry win over the device and
/// sample rate given here.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CpalConfig {
    /// Output device name substring. `None` uses the host default.
    pub device: Option<String>,
    /// Preferred output sample rate.
    pub sample_rate: Option<u32>,
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Upper bound for a fixed stream buffer size, in frames.
    pub max_buffer_frames: u32,
}

impl Default for CpalConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: None,
            chunk_frames: 1024,
            max_buffer_frames: 16_384,
        }
    }
}

impl CpalConfig {
    /// Load configuration from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            std::fs::read_to_string(path).with_context(|| format!("read config {:?}", path))?;
        let cfg =
            toml::from_str::<CpalConfig>(&raw).with_context(|| format!("parse config {:?}", path))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let cfg: CpalConfig = toml::from_str(r#"device = "USB DAC""#).unwrap();
        assert_eq!(cfg.device.as_deref(), Some("USB DAC"));
        assert_eq!(cfg.chunk_frames, 1024);
        assert_eq!(cfg.max_buffer_frames, 16_384);
        assert!(cfg.sample_rate.is_none());
    }

    #[test]
    fn load_reads_file() {
        let dir = std::env::temp_dir().join(format!("wave-cpal-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("audio.toml");
        std::fs::write(&path, "sample_rate = 44100\nchunk_frames = 512\n").unwrap();

        let cfg = CpalConfig::load(&path).unwrap();
        assert_eq!(cfg.sample_rate, Some(44_100));
        assert_eq!(cfg.chunk_frames, 512);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let dir = std::env::temp_dir().join(format!("wave-cpal-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "chunk_frames = \"lots\"").unwrap();

        let err = CpalConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parse config"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
