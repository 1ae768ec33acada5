//! Request validation for the Node service.
//!
//! Validation is pure: it looks only at the request and either accepts it
//! or returns the [`CsiError::InvalidArgument`] for the first failed check.
//! Checks run in a fixed order so a request with several problems always
//! reports the same one.

use crate::csi::volume_capability::access_mode::Mode;
use crate::csi::volume_capability::{AccessType, MountVolume};
use crate::csi::{NodePublishVolumeRequest, NodeUnpublishVolumeRequest, VolumeCapability};
use crate::error::CsiError;

/// Volume context key the kubelet sets for ephemeral inline volumes.
pub const EPHEMERAL_CONTEXT_KEY: &str = "csi.storage.k8s.io/ephemeral";

pub const MISSING_VOLUME_ID: &str = "request missing required volume id";
pub const MISSING_TARGET_PATH: &str = "request missing required target path";
pub const MISSING_VOLUME_CAPABILITY: &str = "request missing required volume capability";
pub const MISSING_ACCESS_TYPE: &str = "request missing required volume capability access type";
pub const ACCESS_TYPE_NOT_SIMPLE_MOUNT: &str =
    "request volume capability access type must be a simple mount";
pub const MISSING_ACCESS_MODE: &str = "request missing required volume capability access mode";
pub const ACCESS_MODE_NOT_VALID: &str = "request volume capability access mode is not valid";
pub const READ_ONLY_REQUIRED: &str = "pod.spec.volumes[].csi.readOnly must be set to 'true'";
pub const EPHEMERAL_ONLY: &str = "only ephemeral volumes are supported";

/// Validate a `NodePublishVolume` request.
///
/// The host-side mount is read-write (so SELinux relabeling and the agent
/// keep working), so the read-only guarantee to the workload has to come
/// from the pod spec: `readonly` must be set and a read-only access mode is
/// refused.
pub fn validate_publish(req: &NodePublishVolumeRequest) -> Result<(), CsiError> {
    if req.volume_id.is_empty() {
        return Err(CsiError::invalid_argument(MISSING_VOLUME_ID));
    }
    if req.target_path.is_empty() {
        return Err(CsiError::invalid_argument(MISSING_TARGET_PATH));
    }
    let Some(capability) = req.volume_capability.as_ref() else {
        return Err(CsiError::invalid_argument(MISSING_VOLUME_CAPABILITY));
    };
    validate_capability(capability)?;
    if !req.readonly {
        return Err(CsiError::invalid_argument(READ_ONLY_REQUIRED));
    }
    if req.volume_context.get(EPHEMERAL_CONTEXT_KEY).map(String::as_str) != Some("true") {
        return Err(CsiError::invalid_argument(EPHEMERAL_ONLY));
    }
    Ok(())
}

fn validate_capability(capability: &VolumeCapability) -> Result<(), CsiError> {
    let Some(access_type) = capability.access_type.as_ref() else {
        return Err(CsiError::invalid_argument(MISSING_ACCESS_TYPE));
    };
    if !is_plain_mount(access_type) {
        return Err(CsiError::invalid_argument(ACCESS_TYPE_NOT_SIMPLE_MOUNT));
    }
    let Some(access_mode) = capability.access_mode.as_ref() else {
        return Err(CsiError::invalid_argument(MISSING_ACCESS_MODE));
    };
    if access_mode.mode == Mode::SingleNodeReaderOnly as i32 {
        return Err(CsiError::invalid_argument(ACCESS_MODE_NOT_VALID));
    }
    Ok(())
}

/// A mount access type with neither a filesystem type nor mount flags.
fn is_plain_mount(access_type: &AccessType) -> bool {
    match access_type {
        AccessType::Mount(MountVolume {
            fs_type,
            mount_flags,
            ..
        }) => fs_type.is_empty() && mount_flags.is_empty(),
        AccessType::Block(_) => false,
    }
}

/// Validate a `NodeUnpublishVolume` request.
///
/// The orchestrator does not echo the capability back on unpublish, so only
/// the identifiers are checked.
pub fn validate_unpublish(req: &NodeUnpublishVolumeRequest) -> Result<(), CsiError> {
    if req.volume_id.is_empty() {
        return Err(CsiError::invalid_argument(MISSING_VOLUME_ID));
    }
    if req.target_path.is_empty() {
        return Err(CsiError::invalid_argument(MISSING_TARGET_PATH));
    }
    Ok(())
}
