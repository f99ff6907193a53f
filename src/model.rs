//! Model staging.
//!
//! The native library loads models from a plain file path, but bundled models
//! ship inside read-only assets (or behind a URL). Staging copies the model
//! into the writable data directory once and reuses it afterwards.

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ModelSettings;

/// A model file ready to hand to the detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedModel {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Copy the model into `data_dir` unless it is already there.
pub fn stage_model(settings: &ModelSettings) -> Result<StagedModel> {
    let dest = settings.data_dir.join(&settings.file_name);
    log::debug!("model destination: {}", dest.display());

    if dest.is_file() {
        log::info!("model already staged at {}", dest.display());
    } else {
        log::info!("model not staged yet, copying from {}", settings.assets_dir);
        let bytes = read_bundled_model(&settings.assets_dir, &settings.file_name)?;
        if bytes.is_empty() {
            return Err(anyhow!(
                "bundled model {} is empty",
                settings.file_name
            ));
        }
        write_atomically(&dest, &bytes)?;
        log::info!("model copied to {} ({} bytes)", dest.display(), bytes.len());
    }

    let staged = describe(&dest)?;
    if let Some(expected) = &settings.sha256 {
        if !staged.sha256.eq_ignore_ascii_case(expected.trim()) {
            return Err(anyhow!(
                "model {} sha256 mismatch (expected {}, found {})",
                dest.display(),
                expected,
                staged.sha256
            ));
        }
        log::info!("model checksum verified");
    }
    log::info!(
        "model ready: {} ({} bytes, sha256 {})",
        staged.path.display(),
        staged.size_bytes,
        staged.sha256
    );
    Ok(staged)
}

fn describe(path: &Path) -> Result<StagedModel> {
    let bytes =
        fs::read(path).with_context(|| format!("failed to read model {}", path.display()))?;
    Ok(StagedModel {
        path: path.to_path_buf(),
        size_bytes: bytes.len() as u64,
        sha256: hex::encode(Sha256::digest(&bytes)),
    })
}

fn read_bundled_model(assets_dir: &str, file_name: &str) -> Result<Vec<u8>> {
    if is_remote(assets_dir) {
        return fetch_remote(assets_dir, file_name);
    }
    let source = Path::new(assets_dir).join(file_name);
    fs::read(&source).with_context(|| {
        format!(
            "failed to read bundled model {} (make sure {} exists in the assets directory)",
            source.display(),
            file_name
        )
    })
}

fn is_remote(assets_dir: &str) -> bool {
    assets_dir.starts_with("http://") || assets_dir.starts_with("https://")
}

#[cfg(feature = "model-fetch")]
fn fetch_remote(assets_dir: &str, file_name: &str) -> Result<Vec<u8>> {
    use std::io::Read;

    let base = url::Url::parse(&format!("{}/", assets_dir.trim_end_matches('/')))
        .context("parse assets url")?;
    let model_url = base.join(file_name).context("build model url")?;
    log::info!("downloading model from {}", model_url);
    let response = ureq::get(model_url.as_str())
        .call()
        .with_context(|| format!("download model from {}", model_url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .context("read model download")?;
    Ok(bytes)
}

#[cfg(not(feature = "model-fetch"))]
fn fetch_remote(assets_dir: &str, _file_name: &str) -> Result<Vec<u8>> {
    Err(anyhow!(
        "assets url {} requires the model-fetch feature",
        assets_dir
    ))
}

fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let tmp = dest.with_extension("partial");
    fs::write(&tmp, bytes).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, dest)
        .with_context(|| format!("failed to move model into {}", dest.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(assets: &Path, data: &Path) -> ModelSettings {
        ModelSettings {
            file_name: "model.tflite".to_string(),
            assets_dir: assets.display().to_string(),
            data_dir: data.to_path_buf(),
            sha256: None,
            labels_path: None,
        }
    }

    #[test]
    fn copies_then_reuses_staged_model() -> Result<()> {
        let assets = tempfile::tempdir()?;
        let data = tempfile::tempdir()?;
        fs::write(assets.path().join("model.tflite"), b"weights-v1")?;
        let cfg = settings(assets.path(), &data.path().join("nested"));

        let staged = stage_model(&cfg)?;
        assert_eq!(staged.size_bytes, 10);
        assert_eq!(fs::read(&staged.path)?, b"weights-v1");

        // A changed bundle does not overwrite an already staged model.
        fs::write(assets.path().join("model.tflite"), b"weights-v2")?;
        let again = stage_model(&cfg)?;
        assert_eq!(again, staged);
        Ok(())
    }

    #[test]
    fn missing_bundle_is_an_error() -> Result<()> {
        let assets = tempfile::tempdir()?;
        let data = tempfile::tempdir()?;
        let err = stage_model(&settings(assets.path(), data.path()))
            .err()
            .ok_or_else(|| anyhow!("expected error"))?;
        assert!(format!("{:#}", err).contains("model.tflite"));
        Ok(())
    }

    #[test]
    fn checksum_pin_is_enforced() -> Result<()> {
        let assets = tempfile::tempdir()?;
        let data = tempfile::tempdir()?;
        fs::write(assets.path().join("model.tflite"), b"abc")?;
        let mut cfg = settings(assets.path(), data.path());
        cfg.sha256 =
            Some("BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD".to_string());
        assert!(stage_model(&cfg).is_ok());

        cfg.sha256 = Some("00".repeat(32));
        assert!(stage_model(&cfg).is_err());
        Ok(())
    }

    #[cfg(not(feature = "model-fetch"))]
    #[test]
    fn remote_assets_need_fetch_feature() {
        let data = tempfile::tempdir().expect("tempdir");
        let cfg = ModelSettings {
            assets_dir: "https://models.example.invalid".to_string(),
            ..settings(Path::new("."), data.path())
        };
        assert!(stage_model(&cfg).is_err());
    }
}
