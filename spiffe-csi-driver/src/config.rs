//! Driver configuration.
//!
//! [`DriverConfig`] is built once at startup and never mutated afterwards.
//! [`Args`] is the command line of the `spiffe-csi-driver` binary; it
//! resolves into a [`DriverConfig`] plus the CSI socket path.
//!
//! Environment variables:
//! - the one named by `--node-id-env` (default `MY_NODE_NAME`): node
//!   identifier, used when `--node-id` is not given.
//! - `RUST_LOG`: log filter, defaults to `info`.

use std::path::PathBuf;

use clap::Parser;

use crate::error::CsiError;

/// Plugin name registered with the orchestrator.
pub const DEFAULT_PLUGIN_NAME: &str = "csi.spiffe.io";

/// Default location of the CSI endpoint the kubelet connects to.
pub const DEFAULT_CSI_SOCKET_PATH: &str = "/spiffe-csi/csi.sock";

/// Default env var holding the node name (downward API).
pub const DEFAULT_NODE_ID_ENV: &str = "MY_NODE_NAME";

/// Immutable, process-wide driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Node identifier reported by `NodeGetInfo`.
    pub node_id: String,
    /// Directory holding the Workload API socket; the source of every
    /// bind mount.
    pub workload_api_socket_dir: PathBuf,
    /// Name reported by `GetPluginInfo`.
    pub plugin_name: String,
    /// Reported by `NodeGetInfo`; `0` leaves the limit to the orchestrator.
    pub max_volumes_per_node: i64,
}

impl DriverConfig {
    /// Config with the default plugin name and no volume limit.
    pub fn new(node_id: impl Into<String>, workload_api_socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            node_id: node_id.into(),
            workload_api_socket_dir: workload_api_socket_dir.into(),
            plugin_name: DEFAULT_PLUGIN_NAME.to_owned(),
            max_volumes_per_node: 0,
        }
    }

    /// Reject configs the driver cannot run with.
    pub fn validate(&self) -> Result<(), CsiError> {
        if self.node_id.is_empty() {
            return Err(CsiError::Config("node ID is required".into()));
        }
        if self.workload_api_socket_dir.as_os_str().is_empty() {
            return Err(CsiError::Config(
                "workload API socket directory is required".into(),
            ));
        }
        if self.plugin_name.is_empty() {
            return Err(CsiError::Config("plugin name is required".into()));
        }
        if self.max_volumes_per_node < 0 {
            return Err(CsiError::Config(
                "max volumes per node must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Provides the Workload API socket directory via ephemeral inline CSI volumes.
#[derive(Parser, Debug, Clone)]
#[command(name = "spiffe-csi-driver", version)]
pub struct Args {
    /// Kubernetes node ID. If unset, the node ID is read from the
    /// environment variable named by --node-id-env.
    #[arg(long)]
    pub node_id: Option<String>,

    /// Environment variable from which to obtain the node ID. Overridden by --node-id.
    #[arg(long, default_value = DEFAULT_NODE_ID_ENV)]
    pub node_id_env: String,

    /// Path to the CSI socket.
    #[arg(long, default_value = DEFAULT_CSI_SOCKET_PATH)]
    pub csi_socket_path: PathBuf,

    /// Path to the Workload API socket directory.
    #[arg(long)]
    pub workload_api_socket_dir: Option<PathBuf>,

    /// Plugin name reported to the orchestrator.
    #[arg(long, default_value = DEFAULT_PLUGIN_NAME)]
    pub plugin_name: String,

    /// Maximum volumes per node reported by NodeGetInfo (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    pub max_volumes_per_node: i64,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// `--node-id` if given, otherwise the value of the `--node-id-env` variable.
    pub fn resolve_node_id(&self) -> String {
        match &self.node_id {
            Some(node_id) if !node_id.is_empty() => node_id.clone(),
            _ => std::env::var(&self.node_id_env).unwrap_or_default(),
        }
    }

    /// Build the driver configuration.  Validation happens in `Driver::new`.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            node_id: self.resolve_node_id(),
            workload_api_socket_dir: self.workload_api_socket_dir.clone().unwrap_or_default(),
            plugin_name: self.plugin_name.clone(),
            max_volumes_per_node: self.max_volumes_per_node,
        }
    }
}
