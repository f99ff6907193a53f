//! Camera image access.
//!
//! The AR host owns the camera and tracking session. It hands this crate a
//! `CameraFeed` that yields the latest CPU-side image on request. This module
//! provides:
//! - `CpuImage`: one camera image in its native pixel layout
//! - `ConversionParams` and conversion to packed RGB24 for the detector
//! - `SyntheticCamera`: a `stub://` feed for development hosts and tests
//!
//! Feeds MUST NOT block waiting for a frame; "no new frame" is `None`.

mod convert;
mod synthetic;

use anyhow::{anyhow, Result};

use crate::config::CameraSettings;

pub use convert::{convert_to_rgb, ConversionParams, PixelFormat, Rect, Transformation};
pub use synthetic::SyntheticCamera;

/// One CPU-side camera image.
#[derive(Clone, Debug)]
pub struct CpuImage {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl CpuImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Size in bytes of the RGB24 output for `params`.
    pub fn converted_data_size(&self, params: &ConversionParams) -> usize {
        params.output_len()
    }

    pub fn convert(&self, params: &ConversionParams) -> Result<Vec<u8>> {
        convert_to_rgb(&self.data, self.width, self.height, self.format, params)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Host camera as seen by the detection loop.
pub trait CameraFeed: Send {
    fn name(&self) -> &str;

    /// False while the host has the camera paused or disabled.
    fn is_enabled(&self) -> bool;

    /// Latest image, or `None` when no new frame is ready.
    fn try_acquire_latest_image(&mut self) -> Option<CpuImage>;
}

/// Build a camera feed from settings.
///
/// Only `stub://` feeds are built here; real feeds come from the AR host.
pub fn open_camera(settings: &CameraSettings) -> Result<Box<dyn CameraFeed>> {
    if settings.url.starts_with("stub://") {
        let format = PixelFormat::parse(&settings.pixel_format)?;
        log::info!(
            "camera: {} (synthetic {}x{} {:?})",
            settings.url,
            settings.width,
            settings.height,
            format
        );
        return Ok(Box::new(SyntheticCamera::new(
            settings.url.clone(),
            settings.width,
            settings.height,
            format,
        )));
    }
    Err(anyhow!(
        "camera url '{}' is not a stub:// feed; host cameras must be supplied by the AR runtime",
        settings.url
    ))
}
