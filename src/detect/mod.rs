mod backends;
mod bridge;
mod detector;
mod labels;
mod result;

pub use backends::MockBridge;
#[cfg(feature = "native-ffi")]
pub use backends::NativeBridge;
pub use bridge::DetectorBridge;
pub use detector::{ObjectDetector, DEFAULT_CONFIDENCE_THRESHOLD};
pub use labels::{ClassLabels, COCO_CLASSES};
pub use result::{BBox, DetectedObject, DetectionResult, ImageSize, PerformanceInfo};
