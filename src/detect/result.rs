//! Detection result model.
//!
//! Field names are snake_case to match the payload produced by the native
//! detector. `class_name` and `performance` never come from the payload;
//! they are filled in on this side of the bridge.
//!
//! Missing numeric fields read as zero, so one incomplete detection does not
//! discard the rest of the frame.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::labels::ClassLabels;

/// Normalized bounding box (0..1 coordinates).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(default)]
    pub class_id: i32,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub bbox: BBox,
    /// Label resolved from `class_id` after parsing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
}

impl DetectedObject {
    pub fn x(&self) -> f32 {
        self.bbox.x
    }

    pub fn y(&self) -> f32 {
        self.bbox.y
    }

    pub fn width(&self) -> f32 {
        self.bbox.width
    }

    pub fn height(&self) -> f32 {
        self.bbox.height
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// Locally measured timing for one detection. Not part of the native payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceInfo {
    pub inference_time_ms: f32,
    pub preprocessing_time_ms: f32,
    pub postprocessing_time_ms: f32,
    pub memory_usage_mb: Option<u64>,
}

/// Parsed result of one detection call.
///
/// `total_detections` always equals the number of detections; both are
/// private so they cannot drift apart after construction.
///
/// ```compile_fail
/// let mut result = ar_detect::DetectionResult::empty(0.25);
/// result.total_detections = 3;
/// ```
///
/// ```compile_fail
/// let mut result = ar_detect::DetectionResult::empty(0.25);
/// result.detections.clear();
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DetectionResult {
    detections: Vec<DetectedObject>,
    total_detections: usize,
    pub confidence_threshold: f32,
    pub image_size: Option<ImageSize>,
    pub model_input_size: Option<ImageSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceInfo>,
}

#[derive(Debug, Deserialize)]
struct NativePayload {
    #[serde(default)]
    detections: Option<Vec<DetectedObject>>,
    #[serde(default)]
    total_detections: Option<i64>,
    #[serde(default)]
    confidence_threshold: Option<f32>,
    #[serde(default)]
    image_size: Option<ImageSize>,
    #[serde(default)]
    model_input_size: Option<ImageSize>,
}

impl DetectionResult {
    pub fn new(
        detections: Vec<DetectedObject>,
        confidence_threshold: f32,
        image_size: Option<ImageSize>,
        model_input_size: Option<ImageSize>,
    ) -> Self {
        Self {
            total_detections: detections.len(),
            detections,
            confidence_threshold,
            image_size,
            model_input_size,
            performance: None,
        }
    }

    /// Empty result reporting the threshold that was in effect.
    pub fn empty(confidence_threshold: f32) -> Self {
        Self::new(Vec::new(), confidence_threshold, None, None)
    }

    /// Parse the JSON payload returned by the native detector.
    ///
    /// The detections list is authoritative: a disagreeing `total_detections`
    /// is logged and replaced by the list length.
    pub fn from_json(payload: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(payload).context("detection payload is not valid JSON")?;
        if !value.is_object() {
            return Err(anyhow!("detection payload must be a JSON object"));
        }
        let wire: NativePayload =
            serde_json::from_value(value).context("detection payload has unexpected shape")?;

        let detections = wire.detections.unwrap_or_default();
        if let Some(reported) = wire.total_detections {
            if reported != detections.len() as i64 {
                log::warn!(
                    "native detector reported {} detections but sent {}; using list length",
                    reported,
                    detections.len()
                );
            }
        }

        Ok(Self::new(
            detections,
            wire.confidence_threshold.unwrap_or(0.0),
            wire.image_size,
            wire.model_input_size,
        ))
    }

    pub fn detections(&self) -> &[DetectedObject] {
        &self.detections
    }

    pub fn total_detections(&self) -> usize {
        self.total_detections
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Input image size, zero when the payload omitted it.
    pub fn image_size(&self) -> ImageSize {
        self.image_size.unwrap_or_default()
    }

    /// Model input size, zero when the payload omitted it.
    pub fn model_input_size(&self) -> ImageSize {
        self.model_input_size.unwrap_or_default()
    }

    pub fn performance(&self) -> Option<&PerformanceInfo> {
        self.performance.as_ref()
    }

    /// Resolve `class_name` for every detection.
    pub fn assign_class_names(&mut self, labels: &ClassLabels) {
        for detection in &mut self.detections {
            detection.class_name = labels.name_for(detection.class_id);
        }
    }

}
