//! CSI Node service.
//!
//! Publishing an ephemeral inline volume bind-mounts the Workload API socket
//! directory onto the kubelet-supplied target path:
//!
//! 1. **Publish**: validate, create the target directory, bind-mount the
//!    socket directory onto it (read-write on the host; the kubelet mounts
//!    it read-only into containers).
//! 2. **Unpublish**: unmount the target if it is mounted, then remove the
//!    target directory.
//!
//! Both directions are idempotent so kubelet retries always converge.

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument};

use crate::csi::node_server::Node;
use crate::csi::node_service_capability::rpc::Type as RpcType;
use crate::csi::volume_capability::access_mode::Mode;
use crate::csi::{
    NodeExpandVolumeRequest, NodeExpandVolumeResponse, NodeGetCapabilitiesRequest,
    NodeGetCapabilitiesResponse, NodeGetInfoRequest, NodeGetInfoResponse,
    NodeGetVolumeStatsRequest, NodeGetVolumeStatsResponse, NodePublishVolumeRequest,
    NodePublishVolumeResponse, NodeServiceCapability, NodeStageVolumeRequest,
    NodeStageVolumeResponse, NodeUnpublishVolumeRequest, NodeUnpublishVolumeResponse,
    NodeUnstageVolumeRequest, NodeUnstageVolumeResponse, VolumeCondition,
};
use crate::driver::Driver;
use crate::error::CsiError;
use crate::validation::{validate_publish, validate_unpublish};

/// Mode of a freshly created target directory.
const TARGET_DIR_MODE: u32 = 0o777;

/// Condition message reported for a healthy volume.
pub const CONDITION_MOUNTED: &str = "mounted";

impl Driver {
    #[instrument(
        skip(self, req),
        fields(
            volume_id = %req.volume_id,
            target_path = %req.target_path,
            access_mode = tracing::field::Empty
        )
    )]
    async fn publish(&self, req: &NodePublishVolumeRequest) -> Result<(), CsiError> {
        if let Some(mode) = access_mode(req) {
            tracing::Span::current().record("access_mode", tracing::field::debug(mode));
        }
        validate_publish(req)?;

        let target = Path::new(&req.target_path);
        let mounted = self
            .mounter()
            .is_mount_point(target)
            .map_err(|e| CsiError::mount_table(&req.target_path, e))?;
        if mounted {
            debug!("target already mounted, assuming idempotent retry");
            return Ok(());
        }

        match tokio::fs::DirBuilder::new()
            .mode(TARGET_DIR_MODE)
            .create(target)
            .await
        {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("target path already exists");
            }
            Err(e) => {
                return Err(CsiError::CreateTargetPath {
                    path: req.target_path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.mounter()
            .bind_mount(self.workload_api_socket_dir(), target, true)
            .map_err(|e| CsiError::mount_failed(&req.target_path, e))?;

        info!(
            source = %self.workload_api_socket_dir().display(),
            "volume published"
        );
        Ok(())
    }

    #[instrument(
        skip(self, req),
        fields(volume_id = %req.volume_id, target_path = %req.target_path)
    )]
    async fn unpublish(&self, req: &NodeUnpublishVolumeRequest) -> Result<(), CsiError> {
        validate_unpublish(req)?;

        let target = Path::new(&req.target_path);
        let mounted = self
            .mounter()
            .is_mount_point(target)
            .map_err(|e| CsiError::mount_table(&req.target_path, e))?;
        if mounted {
            self.mounter()
                .unmount(target)
                .map_err(|e| CsiError::unmount_failed(&req.target_path, e))?;
        } else {
            debug!("target not mounted, nothing to unmount");
        }

        match tokio::fs::remove_dir(target).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("target path already removed");
            }
            Err(e) => {
                return Err(CsiError::RemoveTargetPath {
                    path: req.target_path.clone(),
                    reason: e.to_string(),
                });
            }
        }

        info!("volume unpublished");
        Ok(())
    }

    /// Health of a published volume.  `Ok(())` means mounted and listable.
    async fn check_workload_api_mount(&self, volume_path: &str) -> Result<(), String> {
        match self.mounter().is_mount_point(Path::new(volume_path)) {
            Ok(true) => {}
            Ok(false) => return Err("volume path is not mounted".to_owned()),
            Err(e) => {
                return Err(format!(
                    "failed to determine root for volume path mount: {e}"
                ));
            }
        }

        // A broken mount (e.g. the agent's directory went away) fails here.
        tokio::fs::read_dir(volume_path)
            .await
            .map_err(|e| format!("unable to list contents of volume path: {e}"))?;
        Ok(())
    }
}

fn access_mode(req: &NodePublishVolumeRequest) -> Option<Mode> {
    let mode = req.volume_capability.as_ref()?.access_mode.as_ref()?.mode;
    Mode::try_from(mode).ok()
}

#[async_trait]
impl Node for Driver {
    async fn node_stage_volume(
        &self,
        _request: Request<NodeStageVolumeRequest>,
    ) -> Result<Response<NodeStageVolumeResponse>, Status> {
        Err(Status::unimplemented("NodeStageVolume is not supported"))
    }

    async fn node_unstage_volume(
        &self,
        _request: Request<NodeUnstageVolumeRequest>,
    ) -> Result<Response<NodeUnstageVolumeResponse>, Status> {
        Err(Status::unimplemented("NodeUnstageVolume is not supported"))
    }

    async fn node_publish_volume(
        &self,
        request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if let Err(e) = self.publish(&req).await {
            error!(
                volume_id = %req.volume_id,
                target_path = %req.target_path,
                error = %e,
                "failed to publish volume"
            );
            return Err(e.into());
        }
        Ok(Response::new(NodePublishVolumeResponse {}))
    }

    async fn node_unpublish_volume(
        &self,
        request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        if let Err(e) = self.unpublish(&req).await {
            error!(
                volume_id = %req.volume_id,
                target_path = %req.target_path,
                error = %e,
                "failed to unpublish volume"
            );
            return Err(e.into());
        }
        Ok(Response::new(NodeUnpublishVolumeResponse {}))
    }

    async fn node_get_volume_stats(
        &self,
        request: Request<NodeGetVolumeStatsRequest>,
    ) -> Result<Response<NodeGetVolumeStatsResponse>, Status> {
        let req = request.into_inner();

        let condition = match self.check_workload_api_mount(&req.volume_path).await {
            Ok(()) => {
                info!(
                    volume_id = %req.volume_id,
                    volume_path = %req.volume_path,
                    "volume is healthy"
                );
                VolumeCondition {
                    abnormal: false,
                    message: CONDITION_MOUNTED.to_owned(),
                }
            }
            Err(message) => {
                error!(
                    volume_id = %req.volume_id,
                    volume_path = %req.volume_path,
                    error = %message,
                    "volume is unhealthy"
                );
                VolumeCondition {
                    abnormal: true,
                    message,
                }
            }
        };

        Ok(Response::new(NodeGetVolumeStatsResponse {
            usage: Vec::new(),
            volume_condition: Some(condition),
        }))
    }

    async fn node_expand_volume(
        &self,
        _request: Request<NodeExpandVolumeRequest>,
    ) -> Result<Response<NodeExpandVolumeResponse>, Status> {
        Err(Status::unimplemented("NodeExpandVolume is not supported"))
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        Ok(Response::new(NodeGetCapabilitiesResponse {
            capabilities: vec![
                NodeServiceCapability::rpc(RpcType::VolumeCondition),
                NodeServiceCapability::rpc(RpcType::GetVolumeStats),
            ],
        }))
    }

    async fn node_get_info(
        &self,
        _request: Request<NodeGetInfoRequest>,
    ) -> Result<Response<NodeGetInfoResponse>, Status> {
        Ok(Response::new(NodeGetInfoResponse {
            node_id: self.node_id().to_owned(),
            max_volumes_per_node: self.config().max_volumes_per_node,
            accessible_topology: None,
        }))
    }
}
