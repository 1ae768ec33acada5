//! CSI error types.
//!
//! Everything the driver can fail with is a [`CsiError`].  Request problems
//! map onto `INVALID_ARGUMENT`; anything that went wrong while touching the
//! filesystem or the mount table maps onto `INTERNAL`.  The `Display` text of
//! each variant is the gRPC status message, so it must stay stable.

use thiserror::Error;
use tonic::Status;

use crate::mount::MountError;

/// Unified error type for CSI operations.
#[derive(Debug, Error)]
pub enum CsiError {
    /// The request failed validation.  Carries the bare validator message.
    #[error("{0}")]
    InvalidArgument(String),

    /// The target directory could not be created.
    #[error("unable to create target path {path:?}: {reason}")]
    CreateTargetPath {
        /// Target path from the request.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// Bind-mounting the source directory onto the target failed.
    #[error("unable to mount {path:?}: {reason}")]
    MountFailed {
        /// Target path from the request.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// Detaching the mount at the target failed.
    #[error("unable to unmount {path:?}: {reason}")]
    UnmountFailed {
        /// Target path from the request.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// The target directory could not be removed after unmounting.
    #[error("unable to remove target path {path:?}: {reason}")]
    RemoveTargetPath {
        /// Target path from the request.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// The mount table could not be read.
    #[error("unable to determine if {path:?} is mounted: {reason}")]
    MountTable {
        /// Path being looked up.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// The driver configuration is incomplete.
    #[error("{0}")]
    Config(String),

    /// The gRPC listener could not be set up or failed while serving.
    #[error("transport error: {0}")]
    Transport(String),
}

impl CsiError {
    /// Create a [`CsiError::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a [`CsiError::Transport`] from anything that implements
    /// [`std::fmt::Display`].
    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    pub(crate) fn mount_failed(path: &str, e: MountError) -> Self {
        Self::MountFailed {
            path: path.to_owned(),
            reason: e.to_string(),
        }
    }

    pub(crate) fn unmount_failed(path: &str, e: MountError) -> Self {
        Self::UnmountFailed {
            path: path.to_owned(),
            reason: e.to_string(),
        }
    }

    pub(crate) fn mount_table(path: &str, e: MountError) -> Self {
        Self::MountTable {
            path: path.to_owned(),
            reason: e.to_string(),
        }
    }
}

impl From<CsiError> for Status {
    fn from(err: CsiError) -> Self {
        match err {
            CsiError::InvalidArgument(msg) => Status::invalid_argument(msg),
            other => Status::internal(other.to_string()),
        }
    }
}
