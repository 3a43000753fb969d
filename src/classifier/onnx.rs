//! ONNX Runtime backend. Only compiled with the `onnx` feature.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use ort::session::Session;
use ort::value::Tensor;

use super::{ScoringModel, INPUT_SHAPE};
use crate::error::ClassifierError;

pub struct OnnxModel {
    path: PathBuf,
    session: Session,
}

impl OnnxModel {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let session = Session::builder()
            .map_err(load_error(path))?
            .commit_from_file(path)
            .map_err(load_error(path))?;

        Ok(Self {
            path: path.to_path_buf(),
            session,
        })
    }
}

impl ScoringModel for OnnxModel {
    fn score(&mut self, input: &[f32]) -> Result<Vec<f32>, ClassifierError> {
        let tensor = Tensor::from_array((INPUT_SHAPE, input.to_vec())).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(inference_error)?;
        let (_, scores) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        tracing::trace!(path = %self.path.display(), outputs = scores.len(), "onnx inference done");
        Ok(scores.to_vec())
    }
}

fn load_error<E: Display>(path: &Path) -> impl Fn(E) -> ClassifierError + '_ {
    move |err| ClassifierError::ModelLoad {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn inference_error<E: Display>(err: E) -> ClassifierError {
    ClassifierError::Inference(err.to_string())
}
