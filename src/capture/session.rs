use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::models::InjuryLabel;

/// Where the current image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    Gallery,
    Camera,
}

/// The image the user is about to classify.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub source: ImageSource,
    pub path: PathBuf,
    pub image: DynamicImage,
}

impl SelectedImage {
    pub fn new(source: ImageSource, path: impl AsRef<Path>, image: DynamicImage) -> Self {
        Self {
            source,
            path: path.as_ref().to_path_buf(),
            image,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    ImageSelected,
    Classifying,
    Classified(InjuryLabel),
}

/// Capture workflow: Idle → ImageSelected → Classifying → Classified.
///
/// Picking a new image is allowed from every state except `Classifying`, and
/// classification can only start from `ImageSelected`, so two runs never
/// overlap.
#[derive(Debug)]
pub struct CaptureSession {
    state: CaptureState,
    selected: Option<SelectedImage>,
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSession {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            selected: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn selected(&self) -> Option<&SelectedImage> {
        self.selected.as_ref()
    }

    /// Accept an image from a picker or the camera. Returns `false` (and keeps
    /// the current image) while a classification is running.
    pub fn select_image(&mut self, image: SelectedImage) -> bool {
        if self.state == CaptureState::Classifying {
            return false;
        }
        self.selected = Some(image);
        self.state = CaptureState::ImageSelected;
        true
    }

    /// Enter `Classifying`. Returns `false` without changing anything when
    /// there is no fresh image to work on.
    pub fn begin_classification(&mut self) -> bool {
        if self.state != CaptureState::ImageSelected || self.selected.is_none() {
            return false;
        }
        self.state = CaptureState::Classifying;
        true
    }

    pub fn finish_classification(&mut self, label: InjuryLabel) {
        if self.state == CaptureState::Classifying {
            self.state = CaptureState::Classified(label);
        }
    }

    /// Return to `ImageSelected` after a failed run so the user can retry.
    pub fn abort_classification(&mut self) {
        if self.state == CaptureState::Classifying {
            self.state = CaptureState::ImageSelected;
        }
    }
}
