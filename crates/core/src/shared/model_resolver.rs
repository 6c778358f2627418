use std::fs;
use std::path::{Path, PathBuf};

use crate::inference::domain::model_kind::ModelKind;
use crate::shared::error::ModelLoadError;

/// Locate the artifact for `kind` inside `models_dir`.
///
/// Files are never downloaded; a missing or empty file is reported as
/// [`ModelLoadError::Missing`].
pub fn resolve(models_dir: &Path, kind: ModelKind) -> Result<PathBuf, ModelLoadError> {
    let path = models_dir.join(kind.file_name());
    match fs::metadata(&path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path),
        _ => Err(ModelLoadError::Missing { kind, path }),
    }
}

/// Locate an optional side file (such as the swapper's projection matrix).
pub fn resolve_optional(models_dir: &Path, name: &str) -> Option<PathBuf> {
    let path = models_dir.join(name);
    path.is_file().then_some(path)
}

/// Platform-specific default models directory.
///
/// - macOS: `~/Library/Application Support/Face Swap/models/`
/// - Linux: `$XDG_DATA_HOME/Face Swap/models/` or `~/.local/share/Face Swap/models/`
/// - Windows: `%APPDATA%/Face Swap/models/`
pub fn default_models_dir() -> Result<PathBuf, ModelLoadError> {
    dirs::data_dir()
        .map(|d| d.join("Face Swap").join("models"))
        .ok_or(ModelLoadError::NoModelsDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_finds_existing_model() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(ModelKind::FaceSwapper.file_name());
        fs::write(&path, b"onnx bytes").unwrap();

        assert_eq!(resolve(tmp.path(), ModelKind::FaceSwapper).unwrap(), path);
    }

    #[test]
    fn test_resolve_reports_missing_model() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(tmp.path(), ModelKind::FaceEnhancer).unwrap_err();
        assert!(matches!(
            err,
            ModelLoadError::Missing {
                kind: ModelKind::FaceEnhancer,
                ..
            }
        ));
    }

    #[test]
    fn test_resolve_treats_empty_file_as_missing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(ModelKind::FaceDetector.file_name()), b"").unwrap();
        assert!(resolve(tmp.path(), ModelKind::FaceDetector).is_err());
    }

    #[test]
    fn test_resolve_optional() {
        let tmp = TempDir::new().unwrap();
        assert!(resolve_optional(tmp.path(), "side.bin").is_none());
        fs::write(tmp.path().join("side.bin"), b"x").unwrap();
        assert!(resolve_optional(tmp.path(), "side.bin").is_some());
    }

    #[test]
    fn test_default_models_dir_returns_path() {
        let path = default_models_dir().unwrap();
        assert!(path.to_string_lossy().contains("Face Swap"));
        assert!(path.ends_with("models"));
    }
}
