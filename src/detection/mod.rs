pub mod bbox;
pub mod model;
pub mod preprocessing;

use std::collections::HashSet;

use image::DynamicImage;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;
use model::DetectionModel;

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in source image pixels.
    pub bbox: [f32; 4],
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("image has no pixels")]
    EmptyImage,

    #[error("model input size must be positive, got {0}")]
    InputSize(u32),

    #[error("failed to build input tensor: {0}")]
    Preprocess(#[from] ndarray::ShapeError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected model output: {0}")]
    Output(String),
}

/// A loaded inference backend.
pub trait ObjectModel: Send + Sync {
    /// Every candidate the model produced, before any confidence filtering.
    fn predict(&self, image: &DynamicImage) -> Result<Vec<Detection>, DetectError>;
}

/// Class ids of detections scoring strictly above `threshold`, deduplicated.
pub fn unique_classes(detections: &[Detection], threshold: f32) -> HashSet<usize> {
    detections
        .iter()
        .filter(|detection| detection.confidence > threshold)
        .map(|detection| detection.class_id)
        .collect()
}

/// Runs the product model over uploaded images.
///
/// Without a model the detector is degraded: every call to [`Detector::detect`]
/// yields an empty set. Decoding and inference failures are reported the same
/// way, so callers never see an error from the detection path.
pub struct Detector {
    model: Option<Box<dyn ObjectModel>>,
    confidence_threshold: f32,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("ready", &self.is_ready())
            .field("confidence_threshold", &self.confidence_threshold)
            .finish()
    }
}

impl Detector {
    /// Loads the model named by `config`, falling back to degraded mode.
    pub fn load(config: &Config) -> Self {
        match DetectionModel::new(config) {
            Ok(model) => Self::with_model(Box::new(model), config.confidence_threshold),
            Err(e) => {
                warn!("Model unavailable, detection will return no products: {e:#}");
                Self::degraded(config.confidence_threshold)
            }
        }
    }

    pub fn with_model(model: Box<dyn ObjectModel>, confidence_threshold: f32) -> Self {
        Self {
            model: Some(model),
            confidence_threshold,
        }
    }

    pub fn degraded(confidence_threshold: f32) -> Self {
        Self {
            model: None,
            confidence_threshold,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    pub fn detect(&self, image_bytes: &[u8]) -> HashSet<usize> {
        let Some(model) = self.model.as_deref() else {
            warn!("No model loaded, returning empty detections");
            return HashSet::new();
        };

        match self.try_detect(model, image_bytes) {
            Ok(class_ids) => class_ids,
            Err(DetectError::Decode(e)) => {
                debug!("Upload is not a decodable image: {e}");
                HashSet::new()
            }
            Err(e) => {
                error!("Detection failed: {e}");
                HashSet::new()
            }
        }
    }

    fn try_detect(
        &self,
        model: &dyn ObjectModel,
        image_bytes: &[u8],
    ) -> Result<HashSet<usize>, DetectError> {
        let image = image::load_from_memory(image_bytes)?;
        let detections = model.predict(&image)?;
        let class_ids = unique_classes(&detections, self.confidence_threshold);

        debug!(
            candidates = detections.len(),
            classes = ?class_ids,
            "detection finished"
        );
        Ok(class_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    struct FixedModel(Vec<Detection>);

    impl ObjectModel for FixedModel {
        fn predict(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    impl ObjectModel for FailingModel {
        fn predict(&self, _image: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
            Err(DetectError::Inference("backend crashed".to_string()))
        }
    }

    fn detection(class_id: usize, confidence: f32) -> Detection {
        Detection {
            class_id,
            confidence,
            bbox: [0.0, 0.0, 1.0, 1.0],
        }
    }

    fn png_bytes() -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([200, 30, 30])));
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn threshold_is_strict() {
        let classes = unique_classes(&[detection(0, 0.5), detection(1, 0.50001)], 0.5);
        assert_eq!(classes, HashSet::from([1]));
    }

    #[test]
    fn same_class_collapses() {
        let detections = [detection(2, 0.9), detection(2, 0.95), detection(3, 0.1)];
        let classes = unique_classes(&detections, 0.5);
        assert_eq!(classes, HashSet::from([2]));
    }

    #[test]
    fn degraded_detector_finds_nothing() {
        let detector = Detector::degraded(0.5);
        assert!(!detector.is_ready());
        assert!(detector.detect(&png_bytes()).is_empty());
        assert!(detector.detect(b"").is_empty());
    }

    #[test]
    fn missing_model_file_degrades() {
        let config = Config {
            model_path: "does/not/exist.onnx".to_string(),
            ..Config::default()
        };
        let detector = Detector::load(&config);
        assert!(!detector.is_ready());
    }

    #[test]
    fn undecodable_bytes_yield_no_classes() {
        let detector = Detector::with_model(Box::new(FixedModel(vec![detection(0, 0.9)])), 0.5);
        assert!(detector.is_ready());
        assert!(detector.detect(b"definitely not an image").is_empty());
    }

    #[test]
    fn ready_detector_filters_model_output() {
        let model = FixedModel(vec![detection(0, 0.9), detection(0, 0.8), detection(1, 0.3)]);
        let detector = Detector::with_model(Box::new(model), 0.5);
        assert_eq!(detector.detect(&png_bytes()), HashSet::from([0]));
    }

    #[test]
    fn inference_failure_yields_no_classes() {
        let detector = Detector::with_model(Box::new(FailingModel), 0.5);
        assert!(detector.detect(&png_bytes()).is_empty());
    }
}
