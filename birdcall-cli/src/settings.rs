//! Persistent CLI settings (JSON file in the user config directory).

use std::fs;
use std::path::{Path, PathBuf};

use birdcall_core::EngineConfig;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::warn;

const SETTINGS_FILE: &str = "settings.json";
const DEVICES_FILE: &str = "devices.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct Settings {
    /// Device id from `birdcall devices`; `None` uses the host default.
    pub input_device: Option<usize>,
    pub engine: EngineConfig,
    /// Score a mimic has to beat to pass.
    pub threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_device: None,
            engine: EngineConfig::default(),
            threshold: 0.5,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        let defaults = EngineConfig::default();
        let engine = &mut self.engine;

        self.threshold = clamp_or(self.threshold, 0.0, 1.0, 0.5);
        engine.warmup_secs = clamp_or(engine.warmup_secs, 0.0, 5.0, defaults.warmup_secs);
        engine.onset_ratio = clamp_or(engine.onset_ratio, 1.0, 1000.0, defaults.onset_ratio);
        engine.noise_floor_window_secs = clamp_or(
            engine.noise_floor_window_secs,
            0.01,
            5.0,
            defaults.noise_floor_window_secs,
        );
        engine.time_step_secs =
            clamp_or(engine.time_step_secs, 0.001, 0.5, defaults.time_step_secs);
        engine.freq_step_hz = clamp_or(engine.freq_step_hz, 0.5, 100.0, defaults.freq_step_hz);
        engine.freq_smoothing_hz = clamp_or(
            engine.freq_smoothing_hz,
            0.0,
            2000.0,
            defaults.freq_smoothing_hz,
        );
        engine.time_smoothing_secs = clamp_or(
            engine.time_smoothing_secs,
            0.0,
            2.0,
            defaults.time_smoothing_secs,
        );
        engine.recording_padding_secs = clamp_or(
            engine.recording_padding_secs,
            0.0,
            10.0,
            defaults.recording_padding_secs,
        );
        engine.resampler_chunk_size = engine.resampler_chunk_size.clamp(64, 16_384);
    }
}

fn clamp_or(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// `$BIRDCALL_CONFIG_DIR`, else the platform config directory.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("BIRDCALL_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("org", "birdcall", "birdcall")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join(SETTINGS_FILE)
}

pub fn devices_path() -> PathBuf {
    config_dir().join(DEVICES_FILE)
}

/// Missing or unreadable files fall back to defaults.
pub fn load_settings(path: &Path) -> Settings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<Settings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings: {e}");
            Settings::default()
        }),
        Err(_) => Settings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &Settings) -> std::io::Result<()> {
    write_json(path, settings)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("birdcall-settings-{}-{name}", std::process::id()))
            .join(SETTINGS_FILE)
    }

    #[test]
    fn missing_file_gives_defaults() {
        let settings = load_settings(&temp_path("missing"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut settings = Settings::default();
        settings.input_device = Some(3);
        settings.threshold = 0.65;
        save_settings(&path, &settings).unwrap();

        let loaded = load_settings(&path);
        fs::remove_dir_all(path.parent().unwrap()).ok();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = temp_path("partial");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{ "inputDevice": 1, "engine": { "onsetRatio": 20.0 } }"#).unwrap();

        let loaded = load_settings(&path);
        fs::remove_dir_all(path.parent().unwrap()).ok();
        assert_eq!(loaded.input_device, Some(1));
        assert_eq!(loaded.engine.onset_ratio, 20.0);
        assert_eq!(loaded.engine.warmup_secs, 0.1);
        assert_eq!(loaded.threshold, 0.5);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let path = temp_path("malformed");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();

        let loaded = load_settings(&path);
        fs::remove_dir_all(path.parent().unwrap()).ok();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn normalize_clamps_out_of_range() {
        let mut settings = Settings::default();
        settings.threshold = 4.0;
        settings.engine.onset_ratio = 0.0;
        settings.engine.time_step_secs = f32::NAN;
        settings.engine.resampler_chunk_size = 1;
        settings.normalize();

        assert_eq!(settings.threshold, 1.0);
        assert_eq!(settings.engine.onset_ratio, 1.0);
        assert_eq!(settings.engine.time_step_secs, 0.01);
        assert_eq!(settings.engine.resampler_chunk_size, 64);
    }
}
