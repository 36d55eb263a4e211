use facecheck_core::{Thresholds, YawConvention};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Runtime configuration, loaded from a TOML file and/or `FACECHECK_*`
/// environment variables. Environment variables win.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub thresholds: Thresholds,
    /// Minimum spacing between frames handed to the sequencer.
    pub sample_interval_ms: u64,
    /// Classifier model file, checked before the engine starts.
    pub model_path: Option<PathBuf>,
    /// Expected SHA-256 of `model_path`. No check when unset.
    pub model_sha256: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            sample_interval_ms: 50,
            model_path: None,
            model_sha256: None,
        }
    }
}

impl Config {
    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        let t = &mut self.thresholds;
        t.left_yaw_threshold = env_f32("FACECHECK_LEFT_YAW_THRESHOLD", t.left_yaw_threshold);
        t.right_yaw_threshold = env_f32("FACECHECK_RIGHT_YAW_THRESHOLD", t.right_yaw_threshold);
        t.acceptable_yaw = env_f32("FACECHECK_ACCEPTABLE_YAW", t.acceptable_yaw);
        t.extreme_yaw = env_f32("FACECHECK_EXTREME_YAW", t.extreme_yaw);
        t.min_lighting = env_f32("FACECHECK_MIN_LIGHTING", t.min_lighting);
        t.hold_duration_ms = env_u64("FACECHECK_HOLD_DURATION_MS", t.hold_duration_ms);
        if let Ok(v) = std::env::var("FACECHECK_YAW_CONVENTION") {
            match v.as_str() {
                "raw" => t.yaw_convention = YawConvention::Raw,
                "mirrored" => t.yaw_convention = YawConvention::Mirrored,
                other => tracing::warn!(value = other, "ignoring unknown FACECHECK_YAW_CONVENTION"),
            }
        }
        if let Ok(v) = std::env::var("FACECHECK_STATIC_CHECK") {
            t.static_check = v != "0";
        }

        self.sample_interval_ms = env_u64("FACECHECK_SAMPLE_INTERVAL_MS", self.sample_interval_ms);
        if let Ok(v) = std::env::var("FACECHECK_MODEL_PATH") {
            self.model_path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("FACECHECK_MODEL_SHA256") {
            self.model_sha256 = Some(v);
        }
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
