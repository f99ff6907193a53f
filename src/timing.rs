use std::time::Duration;

use crate::detect::PerformanceInfo;

/// Wall-clock breakdown of one detection frame, in milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameTiming {
    pub conversion_ms: f32,
    pub inference_ms: f32,
    pub total_ms: f32,
}

impl FrameTiming {
    pub fn new(conversion: Duration, inference: Duration, total: Duration) -> Self {
        Self {
            conversion_ms: millis(conversion),
            inference_ms: millis(inference),
            total_ms: millis(total),
        }
    }

    /// Time not spent converting or in inference.
    pub fn other_ms(&self) -> f32 {
        (self.total_ms - self.conversion_ms - self.inference_ms).max(0.0)
    }

    /// Percentage of the frame spent in `part_ms`.
    pub fn share(&self, part_ms: f32) -> f32 {
        if self.total_ms <= 0.0 {
            0.0
        } else {
            part_ms / self.total_ms * 100.0
        }
    }

    /// Throughput ceiling if frames ran back to back.
    pub fn max_fps(&self) -> f32 {
        if self.total_ms <= 0.0 {
            0.0
        } else {
            1000.0 / self.total_ms
        }
    }

    pub fn to_performance_info(&self) -> PerformanceInfo {
        PerformanceInfo {
            inference_time_ms: self.inference_ms,
            preprocessing_time_ms: self.conversion_ms,
            postprocessing_time_ms: self.other_ms(),
            memory_usage_mb: None,
        }
    }

    pub fn log_breakdown(&self, enable_gpu: bool, num_threads: u32) {
        log::debug!("frame timing breakdown:");
        log::debug!(
            "  image conversion: {:6.1}ms ({:.1}%)",
            self.conversion_ms,
            self.share(self.conversion_ms)
        );
        log::debug!(
            "  inference total:  {:6.1}ms ({:.1}%)",
            self.inference_ms,
            self.share(self.inference_ms)
        );
        log::debug!(
            "  other overhead:   {:6.1}ms ({:.1}%)",
            self.other_ms(),
            self.share(self.other_ms())
        );
        log::debug!("  total frame time: {:6.1}ms", self.total_ms);
        log::debug!("  max possible fps: {:6.1}", self.max_fps());
        log::debug!("  gpu={} threads={}", enable_gpu, num_threads);
    }
}

fn millis(duration: Duration) -> f32 {
    (duration.as_secs_f64() * 1000.0) as f32
}
