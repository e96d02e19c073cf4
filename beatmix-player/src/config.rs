//! Configuration for the beatmix player
//!
//! A single TOML file, located with the common resolution order (command
//! line, `BEATMIX_CONFIG`, user config dir, system config). Every field has a
//! built-in default, so a missing file means defaults throughout.

use beatmix_common::config::{default_data_dir, load_toml, resolve_config_path};
use beatmix_common::CurvePolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::audio::DEFAULT_SAMPLE_RATE;
use crate::error::{Error, Result};
use crate::mix::MixParams;
use crate::playback::{MixSettings, RecordingSettings};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "BEATMIX_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Tempo (BPM) every song is stretched to
    pub master_tempo: f64,
    pub sample_rate: u32,
    pub beats_per_downbeat: u32,
    /// Samples per device write
    pub frame_len: usize,
    pub slice_queue_capacity: usize,
    pub save_queue_capacity: usize,
    /// Recorded audio is flushed to disk once it exceeds this length
    pub save_threshold_secs: u64,
    pub initial_fade_in_len: u32,
    pub lookahead_downbeats: u32,
    pub stereo: bool,

    /// Output device name (None = default device)
    pub device: Option<String>,

    /// Directory recordings are written to
    pub output_dir: PathBuf,
    /// `{}` is replaced by the recording block number
    pub save_pattern: String,
    pub tracklist_path: PathBuf,
    pub markfile_path: PathBuf,

    /// Sequential selector tuning
    pub selector: SelectorConfig,
    pub fade_curves: CurvePolicy,
    pub logging: LoggingConfig,
}

/// Settings for the built-in sequential selector
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Downbeats each master plays before handing over
    pub phrase_len: usize,
    pub fade_in_len: u32,
    pub fade_out_len: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            master_tempo: 175.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            beats_per_downbeat: 4,
            frame_len: 1024,
            slice_queue_capacity: 6,
            save_queue_capacity: 6,
            save_threshold_secs: 15 * 60,
            initial_fade_in_len: 16,
            lookahead_downbeats: 2,
            stereo: true,
            device: None,
            output_dir: default_data_dir(),
            save_pattern: "mix_{}.wav".to_string(),
            tracklist_path: default_data_dir().join("mix.txt"),
            markfile_path: default_data_dir().join("markfile.csv"),
            selector: SelectorConfig::default(),
            fade_curves: CurvePolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            phrase_len: 32,
            fade_in_len: 8,
            fade_out_len: 8,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive for this crate at the configured level
    pub fn filter_directive(&self) -> String {
        format!("beatmix_player={}", self.level.trim())
    }
}

impl PlayerConfig {
    /// Load from the resolved config file, or defaults when there is none.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let config = match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml::<Self>(&path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.master_tempo.is_finite() && self.master_tempo > 0.0) {
            return Err(Error::Config(format!(
                "master_tempo must be positive, got {}",
                self.master_tempo
            )));
        }
        let counts = [
            ("sample_rate", self.sample_rate as usize),
            ("beats_per_downbeat", self.beats_per_downbeat as usize),
            ("frame_len", self.frame_len),
            ("slice_queue_capacity", self.slice_queue_capacity),
            ("save_queue_capacity", self.save_queue_capacity),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", name)));
            }
        }
        if !self.save_pattern.contains("{}") {
            return Err(Error::Config(format!(
                "save_pattern '{}' has no {{}} placeholder",
                self.save_pattern
            )));
        }
        Ok(())
    }

    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }

    pub fn mix_params(&self) -> MixParams {
        MixParams {
            sample_rate: self.sample_rate,
            master_tempo: self.master_tempo,
            beats_per_downbeat: self.beats_per_downbeat,
            initial_fade_in_len: self.initial_fade_in_len,
            lookahead_downbeats: self.lookahead_downbeats,
        }
    }

    pub fn mix_settings(&self) -> MixSettings {
        MixSettings {
            params: self.mix_params(),
            curves: self.fade_curves.clone(),
            channels: self.channels(),
            frame_len: self.frame_len,
            slice_queue_capacity: self.slice_queue_capacity,
            save_queue_capacity: self.save_queue_capacity,
            recording: RecordingSettings {
                output_dir: self.output_dir.clone(),
                save_pattern: self.save_pattern.clone(),
                tracklist_path: self.tracklist_path.clone(),
                threshold_secs: self.save_threshold_secs,
            },
            markfile_path: self.markfile_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatmix_common::{CurvePair, FadeCurve, FadeType};
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlayerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels(), 2);
        assert_eq!(config.mix_params(), MixParams::default());
    }

    #[test]
    #[serial]
    fn test_load_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("beatmix.toml");
        fs::write(
            &path,
            r#"
master_tempo = 170.0
stereo = false
save_threshold_secs = 60

[selector]
phrase_len = 16

[fade_curves.chill]
fade_in = "linear"
fade_out = "linear"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = PlayerConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.master_tempo, 170.0);
        assert_eq!(config.channels(), 1);
        assert_eq!(config.frame_len, 1024);
        assert_eq!(config.selector.phrase_len, 16);
        assert_eq!(config.selector.fade_in_len, 8);
        assert_eq!(
            config.fade_curves.curves_for(FadeType::Chill),
            CurvePair::matched(FadeCurve::Linear)
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.filter_directive(), "beatmix_player=debug");

        let settings = config.mix_settings();
        assert_eq!(settings.recording.threshold_secs, 60);
        assert_eq!(settings.channels, 1);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let config = PlayerConfig {
            slice_queue_capacity: 0,
            ..PlayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_bad_tempo_and_pattern() {
        let config = PlayerConfig {
            master_tempo: -1.0,
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PlayerConfig {
            save_pattern: "mix.wav".to_string(),
            ..PlayerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
