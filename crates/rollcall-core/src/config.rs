//! Kiosk configuration: a TOML file with every section optional.
//!
//! Resolution order: the explicit `--config` path, then `$ROLLCALL_CONFIG`,
//! then `./rollcall.toml` when present, then built-in defaults. An
//! explicitly named file that is missing is an error; the implicit
//! fallback to defaults is not.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::Deserialize;
use thiserror::Error;

use crate::policy::Schedule;

pub const DEFAULT_CONFIG_PATH: &str = "rollcall.toml";
pub const CONFIG_ENV: &str = "ROLLCALL_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid time {value:?} for {field}: use HH:MM or HH:MM:SS")]
    InvalidTime { field: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

impl Config {
    /// Resolve the config path and load it.
    pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&env_path));
        }
        let default = Path::new(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::from_file(default);
        }
        tracing::debug!("no config file found; using built-in defaults");
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        let config: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        // Surface bad time strings at load, not mid-session.
        config.schedule.schedule()?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

/// `[schedule]`, consumed by the attendance policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub work_start: String,
    pub work_end: String,
    pub grace_minutes: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            work_start: "09:00".to_string(),
            work_end: "17:00".to_string(),
            grace_minutes: 10,
        }
    }
}

impl ScheduleConfig {
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        Ok(Schedule {
            work_start: parse_time("schedule.work_start", &self.work_start)?,
            work_end: parse_time("schedule.work_end", &self.work_end)?,
            grace_minutes: self.grace_minutes,
        })
    }
}

/// `[storage]`: record store and roster directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub records_dir: PathBuf,
    pub employees_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            records_dir: PathBuf::from("attendance_records"),
            employees_dir: PathBuf::from("employees"),
        }
    }
}

/// `[recognition]`, consumed by the external recognizer, passed through
/// with every request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Unix socket where the recognizer service listens.
    pub socket: PathBuf,
    pub min_confidence: f32,
    /// Anti-spoof toggle: when true, matches that fail the liveness check
    /// are ignored.
    pub require_liveness: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            socket: PathBuf::from("/run/rollcall/recognizer.sock"),
            min_confidence: 0.6,
            require_liveness: true,
        }
    }
}

/// `[camera]`: V4L2 device selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Index N maps to /dev/videoN.
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
        }
    }
}

/// `[session]`: kiosk loop tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after a recorded event before the next identify call.
    pub cooldown_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { cooldown_secs: 2 }
    }
}

/// `[ui]`: terminal rendering of session announcements.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub color: bool,
    /// Ring the terminal bell on each recorded event.
    pub bell: bool,
    pub checkin_label: String,
    pub checkout_label: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            color: true,
            bell: true,
            checkin_label: "CHECK-IN".to_string(),
            checkout_label: "CHECK-OUT".to_string(),
        }
    }
}

fn parse_time(field: &'static str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidTime {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.schedule.work_start, "09:00");
        assert_eq!(config.schedule.grace_minutes, 10);
        assert_eq!(config.storage.records_dir, PathBuf::from("attendance_records"));
        assert_eq!(config.camera.index, 0);
        assert_eq!(config.session.cooldown_secs, 2);
        assert!(config.recognition.require_liveness);

        let schedule = config.schedule.schedule().unwrap();
        assert_eq!(schedule.work_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(schedule.late_cutoff(), NaiveTime::from_hms_opt(9, 10, 0).unwrap());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(
            &path,
            "[schedule]\nwork_start = \"08:30\"\ngrace_minutes = 5\n\n[camera]\nindex = 2\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.schedule.work_start, "08:30");
        assert_eq!(config.schedule.grace_minutes, 5);
        assert_eq!(config.schedule.work_end, "17:00");
        assert_eq!(config.camera.index, 2);
        assert_eq!(config.camera.width, 640);
        assert!(config.ui.bell);
    }

    #[test]
    fn test_seconds_precision_times_accepted() {
        let schedule = ScheduleConfig {
            work_start: "09:15:30".to_string(),
            ..ScheduleConfig::default()
        }
        .schedule()
        .unwrap();
        assert_eq!(schedule.work_start, NaiveTime::from_hms_opt(9, 15, 30).unwrap());
    }

    #[test]
    fn test_bad_time_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "[schedule]\nwork_start = \"9 am\"\n").unwrap();

        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::InvalidTime { field: "schedule.work_start", .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(matches!(Config::from_file(&path), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_unparseable_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollcall.toml");
        std::fs::write(&path, "[schedule\nwork_start = ").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse { .. })));
    }
}
