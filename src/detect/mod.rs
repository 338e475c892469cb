mod backend;
mod backends;
mod model;
mod result;

use std::path::Path;

use anyhow::{anyhow, Result};

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use model::{ModelDefinition, OutputLayout};
pub use result::{Detection, DetectionResult, RawDetection, ACCEPT_CONFIDENCE};

/// Prefix selecting the stub backend instead of loading weights.
pub const STUB_SCHEME: &str = "stub://";

fn is_stub(path: &Path) -> bool {
    path.to_str()
        .map(|s| s.starts_with(STUB_SCHEME))
        .unwrap_or(false)
}

/// Load the detector named by a model definition and a weights file.
///
/// Runs the backend's warm-up before returning, so a broken model fails here
/// rather than on the first frame.
pub fn load_backend(model_def: &Path, weights: &Path) -> Result<Box<dyn DetectorBackend>> {
    let definition = if is_stub(model_def) {
        ModelDefinition::default()
    } else {
        ModelDefinition::load(model_def)?
    };

    let mut backend: Box<dyn DetectorBackend> = if is_stub(weights) {
        Box::new(StubBackend::new())
    } else {
        open_weights(weights, definition)?
    };

    backend
        .warm_up()
        .map_err(|e| anyhow!("detector backend {} failed to warm up: {}", backend.name(), e))?;
    log::info!("detector backend: {}", backend.name());
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn open_weights(weights: &Path, definition: ModelDefinition) -> Result<Box<dyn DetectorBackend>> {
    Ok(Box::new(TractBackend::new(weights, definition)?))
}

#[cfg(not(feature = "backend-tract"))]
fn open_weights(weights: &Path, _definition: ModelDefinition) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow!(
        "cannot load weights {}: built without the backend-tract feature (use {} for a dry run)",
        weights.display(),
        STUB_SCHEME
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn stub_weights_select_stub_backend() {
        let backend = load_backend(Path::new("stub://model"), Path::new("stub://weights")).unwrap();
        assert_eq!(backend.name(), "stub");
    }

    #[test]
    fn malformed_definition_fails_before_weights() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();
        assert!(load_backend(file.path(), Path::new("stub://weights")).is_err());
    }

    #[cfg(not(feature = "backend-tract"))]
    #[test]
    fn real_weights_need_tract_feature() {
        let err = load_backend(Path::new("stub://"), Path::new("/models/face.onnx"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("backend-tract"));
    }
}
