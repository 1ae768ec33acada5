//! Fallback for platforms without bind mounts.

use std::path::Path;

use super::{MountError, Mounter};

/// [`Mounter`] that refuses every operation.
#[derive(Debug, Clone, Default)]
pub struct UnsupportedMounter;

impl UnsupportedMounter {
    pub fn new() -> Self {
        Self
    }
}

impl Mounter for UnsupportedMounter {
    fn bind_mount(&self, _source: &Path, _target: &Path, _writable: bool) -> Result<(), MountError> {
        Err(MountError::Unsupported)
    }

    fn unmount(&self, _target: &Path) -> Result<(), MountError> {
        Err(MountError::Unsupported)
    }

    fn is_mount_point(&self, _path: &Path) -> Result<bool, MountError> {
        Err(MountError::Unsupported)
    }
}
