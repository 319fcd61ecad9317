use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::detection::domain::model_config::ModelConfig;

/// Open an ONNX Runtime session on the platform's preferred execution provider.
///
/// Sessions run single-threaded: each engine instance serves one call at a
/// time and the host decides how many instances to run.
pub fn open_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(1)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Falls back to CPU if the platform-specific provider is unavailable.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Static `(height, width)` of the first NCHW input, if the model declares one.
pub fn static_input_size(session: &Session) -> Option<(u32, u32)> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            if shape.len() >= 4 && shape[2] > 0 && shape[3] > 0 {
                Some((shape[2] as u32, shape[3] as u32))
            } else {
                None
            }
        } else {
            None
        }
    })
}

/// Reject a model whose declared input size disagrees with its config.
pub fn check_input_size(
    session: &Session,
    config: &ModelConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    match static_input_size(session) {
        Some((h, w)) if (h, w) != (config.height(), config.width()) => Err(format!(
            "model '{}' expects {w}x{h} input but config says {}x{}",
            config.name(),
            config.width(),
            config.height()
        )
        .into()),
        _ => Ok(()),
    }
}
