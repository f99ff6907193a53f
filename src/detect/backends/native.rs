#![cfg(feature = "native-ffi")]

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use libloading::Library;

use crate::detect::bridge::DetectorBridge;

type InitializeFn = unsafe extern "C" fn(*const c_char, bool, c_int) -> bool;
type SetThresholdFn = unsafe extern "C" fn(f32);
type DetectFn = unsafe extern "C" fn(*const u8, usize, c_int, c_int) -> *mut c_char;
type FreeStringFn = unsafe extern "C" fn(*mut c_char);
type CleanupFn = unsafe extern "C" fn();

/// Symbols the detector library must export.
pub const REQUIRED_SYMBOLS: &[&str] = &[
    "fnd_initialize_detector",
    "fnd_set_confidence_threshold",
    "fnd_get_detailed_detections",
    "fnd_free_string",
    "fnd_cleanup",
];

/// Bridge to the native TensorFlow-Lite detector through its C ABI.
///
/// The library is opened once; every required symbol is resolved up front so
/// a wrong or stale library fails at load time instead of mid-session.
pub struct NativeBridge {
    initialize: InitializeFn,
    set_threshold: SetThresholdFn,
    detect: DetectFn,
    free_string: FreeStringFn,
    cleanup: CleanupFn,
    // Keeps the function pointers above valid.
    _lib: Library,
}

impl NativeBridge {
    pub fn load<P: AsRef<Path>>(lib_path: P) -> Result<Self> {
        let lib_path = lib_path.as_ref();
        // SAFETY: loading runs the library's initializers; the path comes from
        // operator configuration.
        let lib = unsafe { Library::new(lib_path) }
            .with_context(|| format!("failed to load detector library {}", lib_path.display()))?;

        let missing: Vec<&str> = REQUIRED_SYMBOLS
            .iter()
            .copied()
            .filter(|name| unsafe { lib.get::<*const ()>(name.as_bytes()) }.is_err())
            .collect();
        if !missing.is_empty() {
            return Err(anyhow!(
                "detector library {} is missing symbols: {}",
                lib_path.display(),
                missing.join(", ")
            ));
        }

        // SAFETY: signatures match the detector library's exported C ABI.
        let bridge = unsafe {
            Self {
                initialize: *lib.get::<InitializeFn>(b"fnd_initialize_detector\0")?,
                set_threshold: *lib.get::<SetThresholdFn>(b"fnd_set_confidence_threshold\0")?,
                detect: *lib.get::<DetectFn>(b"fnd_get_detailed_detections\0")?,
                free_string: *lib.get::<FreeStringFn>(b"fnd_free_string\0")?,
                cleanup: *lib.get::<CleanupFn>(b"fnd_cleanup\0")?,
                _lib: lib,
            }
        };
        log::info!("native detector library loaded from {}", lib_path.display());
        Ok(bridge)
    }
}

fn to_c_int(value: u32, what: &str) -> Result<c_int> {
    c_int::try_from(value).map_err(|_| anyhow!("{} {} does not fit in a C int", what, value))
}

impl DetectorBridge for NativeBridge {
    fn name(&self) -> &'static str {
        "native"
    }

    fn initialize(
        &mut self,
        model_path: &Path,
        enable_gpu: bool,
        num_threads: u32,
    ) -> Result<bool> {
        let path = model_path
            .to_str()
            .ok_or_else(|| anyhow!("model path {} is not UTF-8", model_path.display()))?;
        let c_path = CString::new(path).context("model path contains a NUL byte")?;
        let threads = to_c_int(num_threads, "thread count")?;
        // SAFETY: c_path outlives the call; the library copies what it keeps.
        Ok(unsafe { (self.initialize)(c_path.as_ptr(), enable_gpu, threads) })
    }

    fn set_confidence_threshold(&mut self, threshold: f32) -> Result<()> {
        // SAFETY: plain value argument.
        unsafe { (self.set_threshold)(threshold) };
        Ok(())
    }

    fn detailed_detections(&mut self, rgb: &[u8], width: u32, height: u32) -> Result<String> {
        let w = to_c_int(width, "frame width")?;
        let h = to_c_int(height, "frame height")?;
        // SAFETY: the library reads `rgb.len()` bytes during the call only.
        let raw = unsafe { (self.detect)(rgb.as_ptr(), rgb.len(), w, h) };
        if raw.is_null() {
            return Err(anyhow!("native detector returned a null payload"));
        }
        // SAFETY: non-null payloads are NUL-terminated strings owned by the
        // library until released with fnd_free_string.
        let payload = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { (self.free_string)(raw) };
        Ok(payload)
    }

    fn cleanup(&mut self) -> Result<()> {
        // SAFETY: no arguments; the library tolerates repeated cleanup.
        unsafe { (self.cleanup)() };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_fails_to_load() {
        let err = NativeBridge::load("/nonexistent/libfastnativedetect.so")
            .err()
            .expect("load should fail");
        assert!(err.to_string().contains("failed to load detector library"));
    }
}
