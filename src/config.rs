use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;

const DEFAULT_MODEL_FILE: &str = "yolo11n_float32.tflite";
const DEFAULT_ASSETS_DIR: &str = "assets";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_INTERVAL_SECS: f64 = 0.2;
/// Shortest allowed pause between detection ticks.
pub const MIN_INTERVAL_SECS: f64 = 0.1;
/// Longest accepted pause between detections (one hour).
pub const MAX_INTERVAL_SECS: f64 = 3600.0;
const DEFAULT_NUM_THREADS: u32 = 4;
const DEFAULT_CAMERA_URL: &str = "stub://ar_camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_PIXEL_FORMAT: &str = "nv12";
const DEFAULT_MAX_DISPLAYED: usize = 5;

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model: Option<ModelConfigFile>,
    detection: Option<DetectionConfigFile>,
    camera: Option<CameraConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    file_name: Option<String>,
    assets_dir: Option<String>,
    data_dir: Option<PathBuf>,
    sha256: Option<String>,
    labels_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    interval_secs: Option<f64>,
    confidence_threshold: Option<f32>,
    enable_gpu: Option<bool>,
    num_threads: Option<u32>,
    auto_detect_threads: Option<bool>,
    show_debug_logs: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pixel_format: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    max_displayed_detections: Option<usize>,
    show_performance_info: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model: ModelSettings,
    pub detection: DetectionSettings,
    pub camera: CameraSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub file_name: String,
    /// Directory or http(s) URL the bundled model is read from.
    pub assets_dir: String,
    /// Writable directory the model is staged into.
    pub data_dir: PathBuf,
    /// Optional hex SHA-256 pin for the staged model.
    pub sha256: Option<String>,
    pub labels_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub interval: Duration,
    pub confidence_threshold: f32,
    pub enable_gpu: bool,
    pub num_threads: u32,
    pub auto_detect_threads: bool,
    pub show_debug_logs: bool,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: String,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub max_displayed_detections: usize,
    pub show_performance_info: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::from_file(DetectorConfigFile::default())
    }
}

impl DetectorConfig {
    /// Load from `AR_DETECT_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("AR_DETECT_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config file, then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => DetectorConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: DetectorConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        Self {
            model: ModelSettings {
                file_name: model
                    .file_name
                    .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string()),
                assets_dir: model
                    .assets_dir
                    .unwrap_or_else(|| DEFAULT_ASSETS_DIR.to_string()),
                data_dir: model
                    .data_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
                sha256: model.sha256,
                labels_path: model.labels_path,
            },
            detection: DetectionSettings {
                // Out-of-range values saturate here and are rejected by `validate`.
                interval: Duration::try_from_secs_f64(
                    detection
                        .interval_secs
                        .unwrap_or(DEFAULT_INTERVAL_SECS)
                        .max(0.0),
                )
                .unwrap_or(Duration::MAX),
                confidence_threshold: detection
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                enable_gpu: detection.enable_gpu.unwrap_or(true),
                num_threads: detection.num_threads.unwrap_or(DEFAULT_NUM_THREADS),
                auto_detect_threads: detection.auto_detect_threads.unwrap_or(false),
                show_debug_logs: detection.show_debug_logs.unwrap_or(true),
            },
            camera: CameraSettings {
                url: camera
                    .url
                    .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                pixel_format: camera
                    .pixel_format
                    .unwrap_or_else(|| DEFAULT_PIXEL_FORMAT.to_string()),
            },
            display: DisplaySettings {
                max_displayed_detections: display
                    .max_displayed_detections
                    .unwrap_or(DEFAULT_MAX_DISPLAYED),
                show_performance_info: display.show_performance_info.unwrap_or(true),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(name) = non_empty_env("AR_DETECT_MODEL") {
            self.model.file_name = name;
        }
        if let Some(dir) = non_empty_env("AR_DETECT_ASSETS_DIR") {
            self.model.assets_dir = dir;
        }
        if let Some(dir) = non_empty_env("AR_DETECT_DATA_DIR") {
            self.model.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = non_empty_env("AR_DETECT_CAMERA_URL") {
            self.camera.url = url;
        }
        if let Some(interval) = non_empty_env("AR_DETECT_INTERVAL_SECS") {
            let secs: f64 = interval.parse().map_err(|_| {
                anyhow!("AR_DETECT_INTERVAL_SECS must be a number of seconds")
            })?;
            if !secs.is_finite() || secs < 0.0 {
                return Err(anyhow!("AR_DETECT_INTERVAL_SECS must be a positive number"));
            }
            self.detection.interval = Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow!("AR_DETECT_INTERVAL_SECS is out of range: {}", e))?;
        }
        if let Some(threshold) = non_empty_env("AR_DETECT_CONFIDENCE") {
            self.detection.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("AR_DETECT_CONFIDENCE must be a number between 0 and 1"))?;
        }
        if let Some(threads) = non_empty_env("AR_DETECT_THREADS") {
            self.detection.num_threads = threads
                .parse()
                .map_err(|_| anyhow!("AR_DETECT_THREADS must be a positive integer"))?;
        }
        if let Some(gpu) = non_empty_env("AR_DETECT_GPU") {
            self.detection.enable_gpu = parse_bool(&gpu)
                .ok_or_else(|| anyhow!("AR_DETECT_GPU must be true/false/1/0"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.model.file_name.trim().is_empty() {
            return Err(anyhow!("model file name must not be empty"));
        }
        let interval = self.detection.interval.as_secs_f64();
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&interval) {
            return Err(anyhow!(
                "detection interval must be within {}s..={}s, got {}s",
                MIN_INTERVAL_SECS,
                MAX_INTERVAL_SECS,
                interval
            ));
        }
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1, got {}",
                threshold
            ));
        }
        if self.detection.num_threads == 0 {
            return Err(anyhow!("num_threads must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<DetectorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
