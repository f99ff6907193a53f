use anyhow::{anyhow, Result};
use serde_json::json;
use std::path::Path;

use crate::detect::bridge::DetectorBridge;

/// Stand-in for the native library on hosts without it.
///
/// Reports one "person" detection per frame on a fixed 640x480 image, or a
/// scripted payload when one is set. The canned detection is dropped when the threshold rises above its
/// confidence.
pub struct MockBridge {
    initialized: bool,
    refuse_model: bool,
    confidence_threshold: f32,
    payload: Option<String>,
    calls: u64,
}

impl MockBridge {
    pub fn new() -> Self {
        Self {
            initialized: false,
            refuse_model: false,
            confidence_threshold: 0.25,
            payload: None,
            calls: 0,
        }
    }

    /// Return `payload` verbatim from every detection call.
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Make `initialize` report that the model could not be loaded.
    pub fn refusing_model(mut self) -> Self {
        self.refuse_model = true;
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    fn canned_payload(&self) -> String {
        let confidence = 0.85_f32;
        let detections = if confidence >= self.confidence_threshold {
            vec![json!({
                "class_id": 0,
                "confidence": confidence,
                "bbox": {"x": 0.5, "y": 0.5, "width": 0.2, "height": 0.3}
            })]
        } else {
            Vec::new()
        };
        json!({
            "total_detections": detections.len(),
            "detections": detections,
            "confidence_threshold": self.confidence_threshold,
            "image_size": {"width": 640, "height": 480},
            "model_input_size": {"width": 640, "height": 640}
        })
        .to_string()
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBridge for MockBridge {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn initialize(
        &mut self,
        model_path: &Path,
        enable_gpu: bool,
        num_threads: u32,
    ) -> Result<bool> {
        log::debug!(
            "mock bridge initialize model={} gpu={} threads={}",
            model_path.display(),
            enable_gpu,
            num_threads
        );
        self.initialized = !self.refuse_model;
        Ok(self.initialized)
    }

    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        self.confidence_threshold = threshold;
        Ok(())
    }

    fn detailed_detections(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<String> {
        if !self.initialized {
            return Err(anyhow!("mock bridge used before initialize"));
        }
        self.calls += 1;
        log::trace!("mock bridge received {}x{} frame ({} bytes)", width, height, rgb.len());
        Ok(match &self.payload {
            Some(payload) => payload.clone(),
            None => self.canned_payload(),
        })
    }
}
