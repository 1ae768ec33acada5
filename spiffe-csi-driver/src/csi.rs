//! CSI v1 wire types and gRPC services.
//!
//! Generated by `tonic-build` from the vendored `proto/csi.proto` (server
//! side only, see `build.rs`).  The driver implements
//! [`identity_server::Identity`] and [`node_server::Node`]; the Controller
//! service is compiled but never registered.

tonic::include_proto!("csi.v1");

impl NodeServiceCapability {
    /// Wrap a node RPC capability.
    pub fn rpc(kind: node_service_capability::rpc::Type) -> Self {
        Self {
            r#type: Some(node_service_capability::Type::Rpc(
                node_service_capability::Rpc {
                    r#type: kind as i32,
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use prost::Message;

    use super::*;

    #[test]
    fn publish_request_decodes_capability_oneof() {
        let req = NodePublishVolumeRequest {
            volume_id: "v1".into(),
            target_path: "/tmp/t".into(),
            readonly: true,
            volume_capability: Some(VolumeCapability {
                access_mode: Some(volume_capability::AccessMode {
                    mode: volume_capability::access_mode::Mode::SingleNodeMultiWriter as i32,
                }),
                access_type: Some(volume_capability::AccessType::Mount(
                    volume_capability::MountVolume::default(),
                )),
            }),
            volume_context: HashMap::from([(
                "csi.storage.k8s.io/ephemeral".to_owned(),
                "true".to_owned(),
            )]),
            ..Default::default()
        };

        let decoded = NodePublishVolumeRequest::decode(req.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded, req);
        assert!(matches!(
            decoded.volume_capability.and_then(|c| c.access_type),
            Some(volume_capability::AccessType::Mount(_))
        ));
    }

    #[test]
    fn node_capability_rpc_wraps_type() {
        let cap = NodeServiceCapability::rpc(node_service_capability::rpc::Type::VolumeCondition);
        let Some(node_service_capability::Type::Rpc(rpc)) = cap.r#type else {
            panic!("expected rpc capability");
        };
        assert_eq!(rpc.r#type, 4);
    }

    #[test]
    fn plugin_capability_volume_expansion_uses_second_oneof_tag() {
        let cap = PluginCapability {
            r#type: Some(plugin_capability::Type::VolumeExpansion(
                plugin_capability::VolumeExpansion {
                    r#type: plugin_capability::volume_expansion::Type::Online as i32,
                },
            )),
        };

        // field 2, wire type 2 (length-delimited)
        let bytes = cap.encode_to_vec();
        assert_eq!(bytes[0], (2 << 3) | 2);
        assert_eq!(PluginCapability::decode(bytes.as_slice()).unwrap(), cap);
    }

    #[test]
    fn probe_ready_is_a_wrapped_bool() {
        let unset = ProbeResponse::default();
        assert_eq!(unset.ready, None);

        let ready = ProbeResponse { ready: Some(true) };
        let decoded = ProbeResponse::decode(ready.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.ready, Some(true));
    }
}
