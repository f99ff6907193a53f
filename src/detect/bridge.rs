use anyhow::Result;
use std::path::Path;

/// Call boundary to the external native detection library.
///
/// # Bridge Contract
///
/// The library owns model loading, inference, NMS and delegate selection.
/// This side only forwards pixels and reads back JSON:
///
/// ```text
/// { "detections": [{"class_id", "confidence", "bbox": {"x","y","width","height"}}],
///   "total_detections", "confidence_threshold",
///   "image_size": {"width","height"}, "model_input_size": {"width","height"} }
/// ```
///
/// Implementations must treat the pixel slice as read-only and must not keep
/// it past the `detailed_detections` call.
pub trait DetectorBridge: Send {
    /// Bridge identifier.
    fn name(&self) -> &'static str;

    /// Load the model. `Ok(false)` means the library refused the model.
    fn initialize(&mut self, model_path: &Path, enable_gpu: bool, num_threads: u32)
        -> Result<bool>;

    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()>;

    /// Run detection on a packed RGB24 frame and return the raw JSON payload.
    fn detailed_detections(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<String>;

    /// Release native resources.
    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }
}
