//! Linux bind mounts via `mount(2)`.

use std::path::{Path, PathBuf};

use nix::mount::{MntFlags, MsFlags, mount, umount2};
use tracing::debug;

use super::table::{self, PROC_MOUNTINFO};
use super::{MountError, Mounter};

/// [`Mounter`] backed by the Linux kernel.
#[derive(Debug, Clone)]
pub struct LinuxMounter {
    /// Mount table consulted by `is_mount_point`, re-read on every call.
    mount_table: PathBuf,
}

impl LinuxMounter {
    pub fn new() -> Self {
        Self::with_mount_table(PROC_MOUNTINFO)
    }

    /// Use a different mount table file, e.g. a fixture.
    pub fn with_mount_table(mount_table: impl Into<PathBuf>) -> Self {
        Self {
            mount_table: mount_table.into(),
        }
    }
}

impl Default for LinuxMounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Mounter for LinuxMounter {
    fn bind_mount(&self, source: &Path, target: &Path, writable: bool) -> Result<(), MountError> {
        let mut flags = MsFlags::MS_BIND;
        if !writable {
            flags |= MsFlags::MS_RDONLY;
        }

        mount(Some(source), target, Some("none"), flags, None::<&str>)?;

        // MS_RDONLY is ignored on the initial bind; it only sticks on remount.
        if !writable {
            mount(
                None::<&str>,
                target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            )?;
        }

        debug!(
            source = %source.display(),
            target = %target.display(),
            writable,
            "bind mount created"
        );
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<(), MountError> {
        umount2(target, MntFlags::empty())?;
        debug!(target = %target.display(), "unmounted");
        Ok(())
    }

    fn is_mount_point(&self, path: &Path) -> Result<bool, MountError> {
        table::is_mount_point_in(&self.mount_table, path)
    }
}
