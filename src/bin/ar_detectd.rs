//! ar_detectd - periodic AR object detection daemon
//!
//! This daemon:
//! 1. Loads configuration (file named by --config or AR_DETECT_CONFIG, then env overrides)
//! 2. Stages the detection model into the data directory
//! 3. Brings up the native detector bridge (or the mock bridge)
//! 4. Samples the camera every interval and runs one detection at a time
//! 5. Prints each result until Ctrl-C or --seconds elapses

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ar_detect::ui::{Ui, UiMode};
use ar_detect::{
    open_camera, ArObjectDetector, DetectionPanel, DetectionResult, DetectorBridge,
    DetectorConfig, MockBridge,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file (overrides AR_DETECT_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Use the mock detector even when a native library is given.
    #[arg(long)]
    mock: bool,
    /// Native detector shared library (requires the native-ffi feature).
    #[arg(long, env = "AR_DETECT_NATIVE_LIB")]
    native_lib: Option<PathBuf>,
    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    seconds: Option<u64>,
    /// Output style: plain, pretty or auto.
    #[arg(long)]
    ui: Option<String>,
    /// Print each result as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(args.ui.as_deref()), std::io::stderr().is_terminal());

    let cfg = {
        let stage = ui.stage("Loading configuration");
        let loaded = match &args.config {
            Some(path) => DetectorConfig::load_from(Some(path.as_path())),
            None => DetectorConfig::load(),
        };
        match loaded {
            Ok(cfg) => cfg,
            Err(e) => {
                stage.fail();
                return Err(e);
            }
        }
    };

    let camera = open_camera(&cfg.camera)?;
    let bridge = build_bridge(&args)?;
    let mut detector = ArObjectDetector::new(&cfg, camera, bridge)?;

    {
        let stage = ui.stage("Initializing detector");
        if let Err(e) = detector.initialize(&cfg.model) {
            stage.fail();
            log::error!("cannot start detection loop: {:#}", e);
            return Err(e);
        }
    }

    let panel = DetectionPanel::from(&cfg.display);
    let live = Arc::new(ui.live());
    {
        let live = Arc::clone(&live);
        let json = args.json;
        detector.on_detection_complete(move |result| {
            live.update(&summary_line(result), &panel.render(result));
            if json {
                match serde_json::to_string(result) {
                    Ok(line) => println!("{}", line),
                    Err(e) => log::error!("failed to encode result: {}", e),
                }
            }
        });
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;
    }
    if let Some(seconds) = args.seconds {
        let shutdown = Arc::clone(&shutdown);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(seconds));
            shutdown.store(true, Ordering::SeqCst);
        });
    }

    log::info!(
        "ar_detectd running: camera={} interval={:.2}s threshold={:.2} threads={}",
        cfg.camera.url,
        detector.detection_interval().as_secs_f64(),
        detector.confidence_threshold(),
        detector.num_threads()
    );
    detector.run(&shutdown);
    live.finish();

    match detector.last_result() {
        Some(result) => log::info!(
            "last result: {} detections at threshold {:.2}",
            result.total_detections(),
            result.confidence_threshold()
        ),
        None => log::info!("no detections were completed"),
    }
    Ok(())
}

fn summary_line(result: &DetectionResult) -> String {
    let names: Vec<&str> = result
        .detections()
        .iter()
        .take(3)
        .map(|d| d.class_name.as_str())
        .collect();
    let timing = result
        .performance()
        .map(|p| format!(" | {:.1}ms", p.inference_time_ms))
        .unwrap_or_default();
    if names.is_empty() {
        format!("0 detections{}", timing)
    } else {
        format!(
            "{} detections: {}{}",
            result.total_detections(),
            names.join(", "),
            timing
        )
    }
}

fn build_bridge(args: &Args) -> Result<Box<dyn DetectorBridge>> {
    if args.mock {
        log::warn!("mock detector selected; results are synthetic");
        return Ok(Box::new(MockBridge::new()));
    }
    match &args.native_lib {
        #[cfg(feature = "native-ffi")]
        Some(path) => Ok(Box::new(ar_detect::NativeBridge::load(path)?)),
        #[cfg(not(feature = "native-ffi"))]
        Some(path) => Err(anyhow!(
            "native library {} given but ar_detectd was built without the native-ffi feature",
            path.display()
        )),
        None => {
            log::warn!("no native detector library configured; using mock detector");
            Ok(Box::new(MockBridge::new()))
        }
    }
}
