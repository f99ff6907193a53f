use std::path::Path;
use std::time::Instant;

use super::bridge::DetectorBridge;
use super::labels::ClassLabels;
use super::result::DetectionResult;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Payloads longer than this are logged as head/tail previews.
const PAYLOAD_PREVIEW_LIMIT: usize = 1000;
const PAYLOAD_PREVIEW_CHARS: usize = 500;

/// Detector facade over a native bridge.
///
/// Every failure is logged and reported as `false` or an empty result; none
/// of them is fatal to the caller.
pub struct ObjectDetector {
    bridge: Box<dyn DetectorBridge>,
    labels: ClassLabels,
    initialized: bool,
    confidence_threshold: f32,
}

impl ObjectDetector {
    pub fn new(bridge: Box<dyn DetectorBridge>) -> Self {
        Self::with_labels(bridge, ClassLabels::coco())
    }

    pub fn with_labels(bridge: Box<dyn DetectorBridge>, labels: ClassLabels) -> Self {
        Self {
            bridge,
            labels,
            initialized: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    pub fn bridge_name(&self) -> &'static str {
        self.bridge.name()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn initialize_detector(
        &mut self,
        model_path: &Path,
        enable_gpu: bool,
        num_threads: u32,
    ) -> bool {
        log::info!(
            "initializing {} detector: model={} gpu={} threads={}",
            self.bridge.name(),
            model_path.display(),
            if enable_gpu { "enabled" } else { "disabled" },
            num_threads
        );

        if !model_path.is_file() {
            log::error!("model file not found at {}", model_path.display());
            return false;
        }

        match self.bridge.initialize(model_path, enable_gpu, num_threads) {
            Ok(true) => {
                self.initialized = true;
                log::info!("detector initialized with model {}", model_path.display());
                self.set_confidence_threshold(DEFAULT_CONFIDENCE_THRESHOLD);
                true
            }
            Ok(false) => {
                self.initialized = false;
                log::error!(
                    "native detector refused model {} (corrupt file, incompatible format, or missing runtime)",
                    model_path.display()
                );
                false
            }
            Err(e) => {
                self.initialized = false;
                log::error!("native detector initialization failed: {:#}", e);
                false
            }
        }
    }

    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold;
        match self.bridge.set_confidence_threshold(threshold) {
            Ok(()) => log::debug!("confidence threshold set to {}", threshold),
            Err(e) => log::error!("failed to set confidence threshold: {:#}", e),
        }
    }

    pub fn detect_objects(&mut self, rgb: &[u8], width: u32, height: u32) -> DetectionResult {
        if !self.initialized {
            log::warn!("detector not initialized");
            return self.empty_result();
        }

        log::debug!(
            "detect_objects: image {}x{}, {} bytes",
            width,
            height,
            rgb.len()
        );
        let started = Instant::now();
        let payload = match self.bridge.detailed_detections(rgb, width, height) {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("native detection failed: {:#}", e);
                return self.empty_result();
            }
        };
        log::debug!(
            "native inference time: {:.1}ms",
            started.elapsed().as_secs_f64() * 1000.0
        );

        if payload.trim().is_empty() {
            log::warn!("empty payload returned from native detector");
            return self.empty_result();
        }
        log_payload(&payload);

        let mut result = match DetectionResult::from_json(&payload) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("failed to parse detection payload: {:#}", e);
                return self.empty_result();
            }
        };
        result.assign_class_names(&self.labels);

        for (i, detection) in result.detections().iter().enumerate() {
            log::debug!(
                "detection {}: {} (class {}) conf={:.3} bbox=({:.3},{:.3},{:.3},{:.3})",
                i,
                detection.class_name,
                detection.class_id,
                detection.confidence,
                detection.x(),
                detection.y(),
                detection.width(),
                detection.height()
            );
        }
        result
    }

    fn empty_result(&self) -> DetectionResult {
        DetectionResult::empty(self.confidence_threshold)
    }
}

impl Drop for ObjectDetector {
    fn drop(&mut self) {
        if let Err(e) = self.bridge.cleanup() {
            log::error!("detector cleanup failed: {:#}", e);
        }
    }
}

fn log_payload(payload: &str) {
    let chars = payload.chars().count();
    log::debug!("payload length: {} chars", chars);
    if chars > PAYLOAD_PREVIEW_LIMIT {
        let head: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
        let tail: String = payload
            .chars()
            .skip(chars - PAYLOAD_PREVIEW_CHARS)
            .collect();
        log::debug!("payload start: {}", head);
        log::debug!("payload end: {}", tail);
    } else {
        log::debug!("payload: {}", payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::MockBridge;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn model_file() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().expect("temp model");
        std::fs::write(file.path(), b"tflite").expect("write model");
        file
    }

    struct FailingBridge {
        cleaned: Arc<AtomicBool>,
    }

    impl DetectorBridge for FailingBridge {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn initialize(&mut self, _: &Path, _: bool, _: u32) -> Result<bool> {
            Ok(true)
        }

        fn set_confidence_threshold(&mut self, _: f32) -> Result<()> {
            Err(anyhow!("threshold rejected"))
        }

        fn detailed_detections(&mut self, _: &[u8], _: u32, _: u32) -> Result<String> {
            Err(anyhow!("inference crashed"))
        }

        fn cleanup(&mut self) -> Result<()> {
            self.cleaned.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn missing_model_file_fails_initialization() {
        let mut detector = ObjectDetector::new(Box::new(MockBridge::new()));
        assert!(!detector.initialize_detector(Path::new("/nonexistent/model.tflite"), true, 4));
        assert!(!detector.is_initialized());
    }

    #[test]
    fn refused_model_fails_initialization() {
        let model = model_file();
        let mut detector = ObjectDetector::new(Box::new(MockBridge::new().refusing_model()));
        assert!(!detector.initialize_detector(model.path(), true, 4));
        assert!(!detector.is_initialized());
    }

    #[test]
    fn uninitialized_detector_returns_empty_result() {
        let mut detector = ObjectDetector::new(Box::new(MockBridge::new()));
        detector.set_confidence_threshold(0.4);
        let result = detector.detect_objects(&[0u8; 12], 2, 2);
        assert!(result.is_empty());
        assert_eq!(result.confidence_threshold(), 0.4);
    }

    #[test]
    fn maps_class_names_after_detection() {
        let model = model_file();
        let payload = r#"{"detections": [
            {"class_id": 16, "confidence": 0.7, "bbox": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}},
            {"class_id": 99, "confidence": 0.3, "bbox": {"x": 0.4, "y": 0.4, "width": 0.1, "height": 0.1}}
        ], "total_detections": 2, "confidence_threshold": 0.25}"#;
        let mut detector = ObjectDetector::new(Box::new(MockBridge::new().with_payload(payload)));
        assert!(detector.initialize_detector(model.path(), false, 2));

        let result = detector.detect_objects(&[0u8; 12], 2, 2);
        assert_eq!(result.total_detections(), 2);
        assert_eq!(result.detections()[0].class_name, "dog");
        assert_eq!(result.detections()[1].class_name, "Unknown(99)");
    }

    #[test]
    fn malformed_or_empty_payload_yields_empty_result() {
        let model = model_file();
        for payload in ["", "   ", "{not json"] {
            let mut detector =
                ObjectDetector::new(Box::new(MockBridge::new().with_payload(payload)));
            assert!(detector.initialize_detector(model.path(), true, 4));
            let result = detector.detect_objects(&[], 0, 0);
            assert!(result.is_empty());
            assert_eq!(result.confidence_threshold(), DEFAULT_CONFIDENCE_THRESHOLD);
        }
    }

    #[test]
    fn bridge_errors_are_contained_and_cleanup_runs_on_drop() {
        let model = model_file();
        let cleaned = Arc::new(AtomicBool::new(false));
        {
            let mut detector = ObjectDetector::new(Box::new(FailingBridge {
                cleaned: cleaned.clone(),
            }));
            assert!(detector.initialize_detector(model.path(), true, 4));
            detector.set_confidence_threshold(0.5);
            assert_eq!(detector.confidence_threshold(), 0.5);
            assert!(detector.detect_objects(&[1, 2, 3], 1, 1).is_empty());
        }
        assert!(cleaned.load(Ordering::SeqCst));
    }
}
