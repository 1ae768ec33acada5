//! Mount primitives used by the Node service.
//!
//! The driver never calls the kernel directly; it goes through a [`Mounter`]
//! handed to it at construction.  [`SystemMounter`] is the backend for the
//! platform the crate was built for:
//! - Linux: `mount(2)`/`umount2(2)` plus a scan of `/proc/self/mountinfo`
//! - everything else: every operation fails with [`MountError::Unsupported`]
//!
//! Tests substitute their own [`Mounter`] so publish/unpublish can run
//! without privileges.

use std::path::Path;

use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod table;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(not(target_os = "linux"))]
mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::LinuxMounter as SystemMounter;

#[cfg(not(target_os = "linux"))]
pub use unsupported::UnsupportedMounter as SystemMounter;

/// Errors raised by the mount primitives and the mount-table parser.
#[derive(Debug, Error)]
pub enum MountError {
    /// A mount syscall failed.
    #[error(transparent)]
    Sys(#[from] nix::Error),

    /// Reading the mount table failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A mount-table line had too few fields to be a mount entry.
    #[error("malformed mount table line: {0:?}")]
    MalformedLine(String),

    /// Bind mounts are not available on this platform.
    #[error("unsupported on this platform")]
    Unsupported,
}

/// Capability set the Node service needs from the host.
///
/// Implementations must be callable from many RPC tasks at once.  The
/// methods are synchronous: they block the calling task for the duration of
/// the syscall, which is short.
pub trait Mounter: Send + Sync {
    /// Bind-mount `source` onto `target`.  `writable = false` makes the
    /// mount read-only.
    fn bind_mount(&self, source: &Path, target: &Path, writable: bool) -> Result<(), MountError>;

    /// Detach the mount at `target`.
    fn unmount(&self, target: &Path) -> Result<(), MountError>;

    /// Whether `path` is listed verbatim as a mount point right now.
    ///
    /// Absence is `Ok(false)`; only an unreadable mount table is an error.
    fn is_mount_point(&self, path: &Path) -> Result<bool, MountError>;
}
