//! Text rendering of detection results for a HUD or console.

use std::fmt::Write as _;

use crate::config::DisplaySettings;
use crate::detect::DetectionResult;

pub const SLIDER_MIN: f32 = 0.1;
pub const SLIDER_MAX: f32 = 1.0;
pub const SLIDER_DEFAULT: f32 = 0.25;

/// Formats the three text fields of the detection overlay.
#[derive(Clone, Debug)]
pub struct DetectionPanel {
    pub max_displayed: usize,
    pub show_performance: bool,
}

impl Default for DetectionPanel {
    fn default() -> Self {
        Self {
            max_displayed: 5,
            show_performance: true,
        }
    }
}

impl From<&DisplaySettings> for DetectionPanel {
    fn from(settings: &DisplaySettings) -> Self {
        Self {
            max_displayed: settings.max_displayed_detections,
            show_performance: settings.show_performance_info,
        }
    }
}

impl DetectionPanel {
    pub fn count_text(&self, result: &DetectionResult) -> String {
        format!("Detections: {}", result.total_detections())
    }

    pub fn list_text(&self, result: &DetectionResult) -> String {
        let detections = result.detections();
        if detections.is_empty() {
            return "No objects detected".to_string();
        }
        let mut text = String::new();
        for detection in detections.iter().take(self.max_displayed) {
            let _ = writeln!(
                text,
                "{}: {:.2}",
                detection.class_name, detection.confidence
            );
        }
        if detections.len() > self.max_displayed {
            let _ = writeln!(
                text,
                "... and {} more",
                detections.len() - self.max_displayed
            );
        }
        text
    }

    /// Timing when measured, otherwise image/model sizes and threshold.
    pub fn info_text(&self, result: &DetectionResult) -> Option<String> {
        if !self.show_performance {
            return None;
        }
        Some(match result.performance() {
            Some(perf) => {
                let mut text = format!("Inference: {:.1}ms", perf.inference_time_ms);
                if let Some(mb) = perf.memory_usage_mb {
                    let _ = write!(text, "\nMemory: {}MB", mb);
                }
                text
            }
            None => {
                let image = result.image_size();
                let model = result.model_input_size();
                format!(
                    "Image: {}x{}\nModel: {}x{}\nThreshold: {:.2}",
                    image.width,
                    image.height,
                    model.width,
                    model.height,
                    result.confidence_threshold()
                )
            }
        })
    }

    /// All fields joined for a console.
    pub fn render(&self, result: &DetectionResult) -> String {
        let mut out = format!("{}\n{}", self.count_text(result), self.list_text(result));
        if let Some(info) = self.info_text(result) {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&info);
        }
        out
    }

    /// Text shown before any result arrives.
    pub fn placeholder(&self) -> String {
        "Detections: 0\nNo objects detected".to_string()
    }
}

/// Confidence threshold slider state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceSlider {
    value: f32,
}

impl Default for ConfidenceSlider {
    fn default() -> Self {
        Self {
            value: SLIDER_DEFAULT,
        }
    }
}

impl ConfidenceSlider {
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Clamp to the slider range and return the applied value.
    pub fn set_value(&mut self, value: f32) -> f32 {
        self.value = if value.is_nan() {
            SLIDER_DEFAULT
        } else {
            value.clamp(SLIDER_MIN, SLIDER_MAX)
        };
        self.value
    }
}
