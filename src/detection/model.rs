use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use super::bbox::decode_predictions;
use super::preprocessing::preprocess_image;
use super::{DetectError, Detection, ObjectModel};
use crate::config::Config;

/// YOLOv8 detector exported to ONNX.
pub struct DetectionModel {
    /// `run` needs exclusive access to the session.
    session: Mutex<Session>,
    input_name: String,
    input_size: u32,
}

impl std::fmt::Debug for DetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionModel")
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

impl DetectionModel {
    pub fn new(config: &Config) -> Result<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            anyhow::bail!("model file not found at {}", model_path.display());
        }

        let session = Session::builder()
            .context("failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to set optimization level")?
            .with_intra_threads(config.intra_threads)
            .context("failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());
        debug!(input = %input_name, outputs = session.outputs.len(), "model signature");

        info!("Model loaded from {}", model_path.display());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            input_size: config.input_size,
        })
    }
}

impl ObjectModel for DetectionModel {
    fn predict(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
        let (input, letterbox) = preprocess_image(image, self.input_size)?;
        let input = Tensor::from_array(input).map_err(|e| DetectError::Inference(e.to_string()))?;

        let mut session = lock_session(&self.session);
        let outputs = session
            .run(ort::inputs![&self.input_name => input])
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::Output(e.to_string()))?;
        let detections = decode_predictions(output, &letterbox)?;

        Ok(detections)
    }
}

/// A panic during a previous run leaves the session usable, so poisoning is ignored.
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn poisoned_lock_is_recovered() {
        let session = Arc::new(Mutex::new(7_u32));
        let holder = Arc::clone(&session);
        let _ = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            panic!("run aborted");
        })
        .join();

        assert!(session.is_poisoned());
        assert_eq!(*lock_session(&session), 7);
        *lock_session(&session) += 1;
        assert_eq!(*lock_session(&session), 8);
    }

    #[test]
    fn missing_model_file_is_an_error() {
        let config = Config {
            model_path: "does/not/exist.onnx".to_string(),
            ..Config::default()
        };
        let err = DetectionModel::new(&config).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.onnx"));
    }
}
