//! Detection loop.
//!
//! One polling loop drives everything: wait the configured interval, skip if
//! a detection is still in flight, skip if the camera has nothing new, else
//! convert the frame and run one detection on a worker thread. A single busy
//! flag provides the only exclusion; there is no queue and no retry.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::camera::{CameraFeed, ConversionParams, CpuImage};
use crate::config::{DetectorConfig, ModelSettings, MAX_INTERVAL_SECS, MIN_INTERVAL_SECS};
use crate::detect::{ClassLabels, DetectionResult, DetectorBridge, ObjectDetector};
use crate::model::stage_model;
use crate::timing::FrameTiming;

/// Repeated "not ready" warnings are emitted once per this many ticks.
const WARN_EVERY_TICKS: u64 = 300;
const IDLE_POLL: Duration = Duration::from_millis(2);

/// What a single loop iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous detection is still running.
    Busy,
    CameraDisabled,
    NotInitialized,
    /// The camera had no new image.
    NoFrame,
    /// A detection was started on the worker thread.
    Dispatched,
}

type Listener = Box<dyn Fn(&DetectionResult) + Send + Sync>;

struct Shared {
    detector: Mutex<ObjectDetector>,
    busy: AtomicBool,
    last_result: Mutex<Option<DetectionResult>>,
    listeners: Mutex<Vec<Listener>>,
}

/// Clears the busy flag when the worker finishes, including on panic.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Thread count heuristic: leave cores for the OS, renderer and AR tracking.
pub fn optimal_threads(core_count: usize) -> u32 {
    match core_count {
        0..=4 => 2,
        5..=6 => 4,
        n => (n - 2).min(6) as u32,
    }
}

/// Periodic AR object detector.
pub struct ArObjectDetector {
    shared: Arc<Shared>,
    camera: Box<dyn CameraFeed>,
    interval: Duration,
    confidence_threshold: f32,
    enable_gpu: bool,
    num_threads: u32,
    show_debug_logs: bool,
    tick_count: u64,
    worker: Option<JoinHandle<()>>,
}

impl ArObjectDetector {
    pub fn new(
        config: &DetectorConfig,
        camera: Box<dyn CameraFeed>,
        bridge: Box<dyn DetectorBridge>,
    ) -> Result<Self> {
        let detection = &config.detection;
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let num_threads = if detection.auto_detect_threads {
            let threads = optimal_threads(cores);
            log::info!(
                "auto-detected optimal threads: {} (device has {} cores)",
                threads,
                cores
            );
            threads
        } else {
            log::info!(
                "using configured threads: {} (device has {} cores)",
                detection.num_threads,
                cores
            );
            detection.num_threads
        };

        let labels = match &config.model.labels_path {
            Some(path) => ClassLabels::from_file(path)?,
            None => ClassLabels::coco(),
        };

        Ok(Self {
            shared: Arc::new(Shared {
                detector: Mutex::new(ObjectDetector::with_labels(bridge, labels)),
                busy: AtomicBool::new(false),
                last_result: Mutex::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
            camera,
            interval: detection.interval,
            confidence_threshold: detection.confidence_threshold,
            enable_gpu: detection.enable_gpu,
            num_threads,
            show_debug_logs: detection.show_debug_logs,
            tick_count: 0,
            worker: None,
        })
    }

    /// Stage the model and bring up the native detector.
    ///
    /// The loop must not be started when this fails.
    pub fn initialize(&mut self, model: &ModelSettings) -> Result<()> {
        log::info!("initialization: staging model");
        let staged = stage_model(model)?;
        if !staged.path.is_file() {
            return Err(anyhow!(
                "model file does not exist at {}",
                staged.path.display()
            ));
        }

        log::info!(
            "initialization: starting native detector (gpu={}, threads={})",
            self.enable_gpu,
            self.num_threads
        );
        let mut detector = lock(&self.shared.detector, "detector");
        if !detector.initialize_detector(&staged.path, self.enable_gpu, self.num_threads) {
            return Err(anyhow!(
                "failed to initialize {} detector with model {}",
                detector.bridge_name(),
                staged.path.display()
            ));
        }
        log::info!(
            "initialization: confidence threshold {}",
            self.confidence_threshold
        );
        detector.set_confidence_threshold(self.confidence_threshold);
        log::info!(
            "initialization complete; detection interval {:.2}s",
            self.interval.as_secs_f64()
        );
        Ok(())
    }

    /// Run one loop iteration (without the interval wait).
    pub fn tick(&mut self) -> TickOutcome {
        self.tick_count += 1;

        if self.shared.busy.load(Ordering::SeqCst) {
            return TickOutcome::Busy;
        }
        self.reap_worker();

        if !self.camera.is_enabled() {
            log::warn!("camera {} is disabled", self.camera.name());
            return TickOutcome::CameraDisabled;
        }

        if !lock(&self.shared.detector, "detector").is_initialized() {
            if self.should_warn() {
                log::warn!("detector not initialized yet, waiting");
            }
            return TickOutcome::NotInitialized;
        }

        let Some(image) = self.camera.try_acquire_latest_image() else {
            if self.show_debug_logs && self.should_warn() {
                log::warn!("could not acquire camera image; camera may not be ready yet");
            }
            return TickOutcome::NoFrame;
        };

        if self.show_debug_logs && self.tick_count % 30 == 0 {
            log::debug!("starting detection ({}x{})", image.width, image.height);
        }
        self.dispatch(image);
        TickOutcome::Dispatched
    }

    /// Tick every interval until `shutdown` is set, then drain the worker.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!("detection loop started");
        while !shutdown.load(Ordering::SeqCst) {
            std::thread::sleep(self.interval);
            if shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.tick();
        }
        if !self.wait_idle(Duration::from_secs(5)) {
            log::warn!("detection still in flight at shutdown");
        }
        log::info!("detection loop stopped");
    }

    /// Wait until no detection is in flight. Returns false on timeout.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.shared.busy.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(IDLE_POLL);
        }
        self.reap_worker();
        true
    }

    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::SeqCst)
    }

    pub fn last_result(&self) -> Option<DetectionResult> {
        lock(&self.shared.last_result, "last result").clone()
    }

    /// Register a callback invoked on the worker thread after every detection.
    ///
    /// Listeners must not register further listeners from inside the callback.
    /// A listener that panics is logged and keeps receiving later results.
    pub fn on_detection_complete<F>(&self, listener: F)
    where
        F: Fn(&DetectionResult) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners, "listeners").push(Box::new(listener));
    }

    /// Update the threshold locally and on the native detector.
    pub fn set_confidence_threshold(&mut self, threshold: f32) {
        self.confidence_threshold = threshold;
        lock(&self.shared.detector, "detector").set_confidence_threshold(threshold);
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Set the pause between ticks, clamped to 0.1 s ..= one hour.
    /// NaN falls back to the minimum.
    pub fn set_detection_interval(&mut self, secs: f32) {
        let secs = if secs.is_nan() {
            MIN_INTERVAL_SECS
        } else {
            (secs as f64).clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
        };
        self.interval = Duration::from_secs_f64(secs);
    }

    pub fn detection_interval(&self) -> Duration {
        self.interval
    }

    pub fn num_threads(&self) -> u32 {
        self.num_threads
    }

    fn should_warn(&self) -> bool {
        self.tick_count % WARN_EVERY_TICKS == 1
    }

    fn reap_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("detection worker panicked");
            }
        }
    }

    fn dispatch(&mut self, image: CpuImage) {
        self.shared.busy.store(true, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let enable_gpu = self.enable_gpu;
        let num_threads = self.num_threads;
        let verbose = self.show_debug_logs;
        self.worker = Some(std::thread::spawn(move || {
            run_detection(&shared, image, enable_gpu, num_threads, verbose);
        }));
    }
}

impl Drop for ArObjectDetector {
    fn drop(&mut self) {
        self.reap_worker();
    }
}

fn run_detection(
    shared: &Shared,
    image: CpuImage,
    enable_gpu: bool,
    num_threads: u32,
    verbose: bool,
) {
    let _busy = BusyGuard(&shared.busy);
    let total_start = Instant::now();

    let params = ConversionParams::full_frame(image.width, image.height);
    let conversion_start = Instant::now();
    let rgb = match image.convert(&params) {
        Ok(rgb) => rgb,
        Err(e) => {
            log::error!("image conversion failed: {:#}", e);
            return;
        }
    };
    let conversion = conversion_start.elapsed();
    // The source image is released before inference.
    let (width, height) = (image.width, image.height);
    drop(image);
    if verbose {
        log::debug!(
            "image conversion time: {:.1}ms ({}x{} -> {} bytes)",
            conversion.as_secs_f64() * 1000.0,
            width,
            height,
            rgb.len()
        );
    }

    let inference_start = Instant::now();
    let mut result = lock(&shared.detector, "detector").detect_objects(&rgb, width, height);
    let inference = inference_start.elapsed();

    let timing = FrameTiming::new(conversion, inference, total_start.elapsed());
    result.performance = Some(timing.to_performance_info());

    *lock(&shared.last_result, "last result") = Some(result.clone());
    for (index, listener) in lock(&shared.listeners, "listeners").iter().enumerate() {
        if panic::catch_unwind(AssertUnwindSafe(|| listener(&result))).is_err() {
            log::error!("detection listener {} panicked", index);
        }
    }

    if verbose {
        timing.log_breakdown(enable_gpu, num_threads);
        if result.is_empty() {
            log::debug!("no objects detected in this frame");
        } else {
            log::debug!("detected {} objects:", result.total_detections());
            for detection in result.detections() {
                log::debug!(
                    "  - {}: {:.1}% at ({:.2}, {:.2})",
                    detection.class_name,
                    detection.confidence * 100.0,
                    detection.x(),
                    detection.y()
                );
            }
        }
    }
}

/// Lock `mutex`, taking the data back if a worker panicked while holding it.
fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("{} lock poisoned by a panicked worker; recovering", what);
        mutex.clear_poison();
        poisoned.into_inner()
    })
}
