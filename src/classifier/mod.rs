//! Classifier adapter around the opaque injury model.
//!
//! The model itself is only ever seen through [`ScoringModel`]: a flat input
//! tensor goes in, one score per class comes out. [`Classifier`] owns the
//! preprocessing and the score-to-label decision so every backend behaves the
//! same.

mod preprocess;

#[cfg(feature = "onnx")]
mod onnx;

use std::path::Path;

use image::DynamicImage;

use crate::error::ClassifierError;
use crate::models::InjuryLabel;

pub use preprocess::{pixels_to_tensor, to_input_tensor, INPUT_LEN, INPUT_SHAPE, INPUT_SIDE};

#[cfg(feature = "onnx")]
pub use onnx::OnnxModel;

/// Anything that can turn a preprocessed input tensor into class scores.
pub trait ScoringModel: Send {
    /// `input` always holds [`INPUT_LEN`] values laid out as [`INPUT_SHAPE`].
    fn score(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError>;
}

pub struct Classifier {
    model: Box<dyn ScoringModel>,
}

impl Classifier {
    pub fn new(model: Box<dyn ScoringModel>) -> Self {
        Self { model }
    }

    /// Load the model artifact at `path` with the compiled-in backend.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        if !path.is_file() {
            return Err(ClassifierError::ModelMissing(path.to_path_buf()));
        }
        let model = load_backend(path)?;
        tracing::info!(path = %path.display(), "injury model loaded");
        Ok(Self::new(model))
    }

    /// Run the full pipeline on one image.
    pub fn classify(&mut self, image: &DynamicImage) -> Result<InjuryLabel, ClassifierError> {
        let tensor = to_input_tensor(image);
        self.classify_tensor(&tensor)
    }

    /// Score an already preprocessed tensor.
    pub fn classify_tensor(&mut self, tensor: &[f32]) -> Result<InjuryLabel, ClassifierError> {
        if tensor.len() != INPUT_LEN {
            return Err(ClassifierError::InputShape {
                expected: INPUT_LEN,
                actual: tensor.len(),
            });
        }
        let scores = self.model.score(tensor)?;
        let label = InjuryLabel::from_scores(&scores);
        tracing::debug!(?scores, %label, "classified image");
        Ok(label)
    }
}

#[cfg(feature = "onnx")]
fn load_backend(path: &Path) -> Result<Box<dyn ScoringModel>, ClassifierError> {
    Ok(Box::new(OnnxModel::load(path)?))
}

#[cfg(not(feature = "onnx"))]
fn load_backend(path: &Path) -> Result<Box<dyn ScoringModel>, ClassifierError> {
    Err(ClassifierError::ModelLoad {
        path: path.to_path_buf(),
        reason: "built without an inference backend (enable the `onnx` feature)".to_string(),
    })
}
