//! AR object detection layer.
//!
//! This crate samples CPU camera images from a host AR session, forwards
//! them to an external native object detector, and publishes typed results.
//!
//! # Architecture
//!
//! A single polling loop drives a linear pipeline:
//!
//! 1. **Sample**: every interval, take the latest camera image if one is ready.
//! 2. **Convert**: reformat the image to packed RGB24.
//! 3. **Detect**: hand the pixels to the native library through the bridge.
//! 4. **Publish**: parse the JSON payload, store it as the last result, notify listeners.
//!
//! At most one detection is in flight; ticks that arrive while it runs are
//! skipped. Failures are logged and produce empty results, never a crash.
//!
//! # Module Structure
//!
//! - `camera`: camera feeds, CPU images and RGB conversion
//! - `detect`: bridge trait, backends, result model, class labels
//! - `model`: staging the model file for the native library
//! - `runtime`: the detection loop
//! - `display`, `ui`: text output
//! - `config`: file and environment configuration

pub mod camera;
pub mod config;
pub mod detect;
pub mod display;
pub mod model;
pub mod runtime;
pub mod timing;
pub mod ui;

pub use camera::{
    open_camera, CameraFeed, ConversionParams, CpuImage, PixelFormat, SyntheticCamera,
    Transformation,
};
pub use config::{CameraSettings, DetectionSettings, DetectorConfig, ModelSettings};
#[cfg(feature = "native-ffi")]
pub use detect::NativeBridge;
pub use detect::{
    BBox, ClassLabels, DetectedObject, DetectionResult, DetectorBridge, ImageSize, MockBridge,
    ObjectDetector, PerformanceInfo,
};
pub use display::{ConfidenceSlider, DetectionPanel};
pub use model::{stage_model, StagedModel};
pub use runtime::{optimal_threads, ArObjectDetector, TickOutcome};
pub use timing::FrameTiming;
