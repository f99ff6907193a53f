use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use ar_detect::config::DetectorConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "AR_DETECT_CONFIG",
        "AR_DETECT_MODEL",
        "AR_DETECT_ASSETS_DIR",
        "AR_DETECT_DATA_DIR",
        "AR_DETECT_INTERVAL_SECS",
        "AR_DETECT_CONFIDENCE",
        "AR_DETECT_THREADS",
        "AR_DETECT_GPU",
        "AR_DETECT_CAMERA_URL",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "file_name": "yolo11s_float16.tflite",
            "assets_dir": "/opt/ar/assets",
            "data_dir": "/var/lib/ar",
            "sha256": "abc123"
        },
        "detection": {
            "interval_secs": 0.5,
            "confidence_threshold": 0.4,
            "enable_gpu": false,
            "num_threads": 2,
            "auto_detect_threads": true
        },
        "camera": {
            "url": "stub://rear",
            "width": 1280,
            "height": 720,
            "pixel_format": "nv21"
        },
        "display": {
            "max_displayed_detections": 3,
            "show_performance_info": false
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("AR_DETECT_CONFIG", file.path());
    std::env::set_var("AR_DETECT_CONFIDENCE", "0.6");
    std::env::set_var("AR_DETECT_GPU", "on");

    let cfg = DetectorConfig::load().expect("load config");

    assert_eq!(cfg.model.file_name, "yolo11s_float16.tflite");
    assert_eq!(cfg.model.assets_dir, "/opt/ar/assets");
    assert_eq!(cfg.model.data_dir.to_str(), Some("/var/lib/ar"));
    assert_eq!(cfg.model.sha256.as_deref(), Some("abc123"));
    assert_eq!(cfg.detection.interval, Duration::from_millis(500));
    assert_eq!(cfg.detection.confidence_threshold, 0.6);
    assert!(cfg.detection.enable_gpu);
    assert_eq!(cfg.detection.num_threads, 2);
    assert!(cfg.detection.auto_detect_threads);
    assert_eq!(cfg.camera.url, "stub://rear");
    assert_eq!(cfg.camera.width, 1280);
    assert_eq!(cfg.camera.pixel_format, "nv21");
    assert_eq!(cfg.display.max_displayed_detections, 3);
    assert!(!cfg.display.show_performance_info);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("AR_DETECT_INTERVAL_SECS", "0.05");
    assert!(DetectorConfig::load().is_err());
    clear_env();

    std::env::set_var("AR_DETECT_INTERVAL_SECS", "1e30");
    let err = DetectorConfig::load().expect_err("huge interval");
    assert!(err.to_string().contains("AR_DETECT_INTERVAL_SECS"));
    clear_env();

    std::env::set_var("AR_DETECT_INTERVAL_SECS", "7200");
    assert!(DetectorConfig::load().is_err());
    clear_env();

    std::env::set_var("AR_DETECT_THREADS", "many");
    assert!(DetectorConfig::load().is_err());
    clear_env();

    std::env::set_var("AR_DETECT_CONFIDENCE", "1.2");
    assert!(DetectorConfig::load().is_err());
    clear_env();
}

#[test]
fn defaults_apply_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = DetectorConfig::load().expect("default config");
    assert_eq!(cfg.model.file_name, "yolo11n_float32.tflite");
    assert_eq!(cfg.detection.interval, Duration::from_millis(200));
    assert_eq!(cfg.camera.pixel_format, "nv12");
}

#[test]
fn oversized_interval_in_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"detection": {"interval_secs": 1e30}}"#)
        .expect("write config");
    let err = DetectorConfig::load_from(Some(file.path())).expect_err("huge interval");
    assert!(err.to_string().contains("detection interval"));
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("AR_DETECT_CONFIG", "/nonexistent/ar_detect.json");
    let err = DetectorConfig::load().expect_err("missing file");
    assert!(err.to_string().contains("failed to read config file"));
    clear_env();
}
