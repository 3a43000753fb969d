//! Everything needed to obtain an image to classify: permission checks, the
//! gallery, the camera, and the capture workflow state machine.

mod camera;
mod gallery;
mod permissions;
mod session;

pub use camera::CameraCapture;
pub use gallery::{is_image_path, list_images, load_image};
pub use permissions::{Capability, DevicePermissions, PermissionProbe, PermissionState};
pub use session::{CaptureSession, CaptureState, ImageSource, SelectedImage};
