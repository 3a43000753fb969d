use std::fmt;
use std::fs;
use std::path::PathBuf;

use crate::error::CaptureError;

/// Host capabilities the capture screen depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Reading images from the gallery directory.
    StorageRead,
    Camera,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::StorageRead, Capability::Camera];
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::StorageRead => f.write_str("storage-read"),
            Capability::Camera => f.write_str("camera"),
        }
    }
}

/// Answers whether a capability is currently available.
pub trait PermissionProbe {
    fn check(&self, capability: Capability) -> bool;
}

/// Probe backed by the real machine: the gallery must be a readable
/// directory, the camera needs both a device node and a capture command.
pub struct DevicePermissions {
    pub gallery_dir: PathBuf,
    pub camera_device: PathBuf,
    pub camera_configured: bool,
}

impl PermissionProbe for DevicePermissions {
    fn check(&self, capability: Capability) -> bool {
        match capability {
            Capability::StorageRead => fs::read_dir(&self.gallery_dir).is_ok(),
            Capability::Camera => self.camera_configured && self.camera_device.exists(),
        }
    }
}

/// Snapshot of what was granted at the last request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PermissionState {
    storage_read: bool,
    camera: bool,
}

impl PermissionState {
    /// Ask the probe for every capability.
    pub fn request(probe: &dyn PermissionProbe) -> Self {
        let state = Self {
            storage_read: probe.check(Capability::StorageRead),
            camera: probe.check(Capability::Camera),
        };
        tracing::info!(
            storage_read = state.storage_read,
            camera = state.camera,
            "permissions checked"
        );
        state
    }

    pub fn granted(&self, capability: Capability) -> bool {
        match capability {
            Capability::StorageRead => self.storage_read,
            Capability::Camera => self.camera,
        }
    }

    /// `Ok` when granted, `PermissionDenied` otherwise.
    pub fn require(&self, capability: Capability) -> Result<(), CaptureError> {
        if self.granted(capability) {
            Ok(())
        } else {
            Err(CaptureError::PermissionDenied(capability))
        }
    }

    pub fn missing(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| !self.granted(*capability))
            .collect()
    }

    pub fn all_granted(&self) -> bool {
        self.storage_read && self.camera
    }
}
