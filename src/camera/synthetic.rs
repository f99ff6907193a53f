use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{CameraFeed, CpuImage, PixelFormat};

/// Synthetic camera for `stub://` URLs and tests.
///
/// Produces a moving gradient in the configured pixel format. The `enabled`
/// and `frames_available` switches are shared handles so a test can flip them
/// while the feed is owned by the detection loop.
pub struct SyntheticCamera {
    name: String,
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_count: u64,
    enabled: Arc<AtomicBool>,
    frames_available: Arc<AtomicBool>,
}

impl SyntheticCamera {
    pub fn new(name: impl Into<String>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            format,
            frame_count: 0,
            enabled: Arc::new(AtomicBool::new(true)),
            frames_available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switch controlling `is_enabled`.
    pub fn enabled_switch(&self) -> Arc<AtomicBool> {
        self.enabled.clone()
    }

    /// Switch controlling whether a new frame is ready.
    pub fn frames_switch(&self) -> Arc<AtomicBool> {
        self.frames_available.clone()
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let w = self.width as usize;
        let h = self.height as usize;
        let shift = self.frame_count as usize;
        match self.format {
            PixelFormat::Rgb24 | PixelFormat::Rgba32 => {
                let channels = if self.format == PixelFormat::Rgb24 { 3 } else { 4 };
                let mut pixels = vec![255u8; w * h * channels];
                for (i, px) in pixels.chunks_exact_mut(channels).enumerate() {
                    let x = i % w;
                    let y = i / w;
                    px[0] = ((x + shift) % 256) as u8;
                    px[1] = ((y + shift) % 256) as u8;
                    px[2] = ((x + y) % 256) as u8;
                }
                pixels
            }
            PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 => {
                let chroma = w.div_ceil(2) * h.div_ceil(2) * 2;
                let mut pixels = vec![128u8; w * h + chroma];
                for (i, luma) in pixels[..w * h].iter_mut().enumerate() {
                    *luma = ((i % w + i / w + shift) % 256) as u8;
                }
                pixels
            }
        }
    }
}

impl CameraFeed for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn try_acquire_latest_image(&mut self) -> Option<CpuImage> {
        if !self.is_enabled() || !self.frames_available.load(Ordering::SeqCst) {
            return None;
        }
        self.frame_count += 1;
        Some(CpuImage::new(
            self.generate_pixels(),
            self.width,
            self.height,
            self.format,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::ConversionParams;

    #[test]
    fn synthetic_frames_convert_cleanly() {
        for format in [
            PixelFormat::Rgb24,
            PixelFormat::Rgba32,
            PixelFormat::Nv12,
            PixelFormat::Nv21,
            PixelFormat::I420,
        ] {
            let mut camera = SyntheticCamera::new("stub://test", 6, 4, format);
            let image = camera.try_acquire_latest_image().expect("frame");
            let rgb = image
                .convert(&ConversionParams::full_frame(6, 4))
                .expect("convert");
            assert_eq!(rgb.len(), 6 * 4 * 3);
        }
    }

    #[test]
    fn switches_gate_frames() {
        let mut camera = SyntheticCamera::new("stub://test", 2, 2, PixelFormat::Nv12);
        camera.frames_switch().store(false, Ordering::SeqCst);
        assert!(camera.try_acquire_latest_image().is_none());

        camera.frames_switch().store(true, Ordering::SeqCst);
        camera.enabled_switch().store(false, Ordering::SeqCst);
        assert!(!camera.is_enabled());
        assert!(camera.try_acquire_latest_image().is_none());
        assert_eq!(camera.frames_captured(), 0);
    }
}
