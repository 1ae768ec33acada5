//! The CSI driver: immutable configuration plus the mount backend.
//!
//! A single [`Driver`] serves both the Identity service ([`crate::identity`])
//! and the Node service ([`crate::node`]).  It holds no per-volume state; the
//! filesystem is the only record of what has been published.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::DriverConfig;
use crate::error::CsiError;
use crate::mount::{Mounter, SystemMounter};

/// Ephemeral-inline CSI driver publishing the Workload API socket directory.
#[derive(Clone)]
pub struct Driver {
    config: DriverConfig,
    mounter: Arc<dyn Mounter>,
}

impl Driver {
    /// Validate `config` and build a driver using the platform mounter.
    pub fn new(config: DriverConfig) -> Result<Self, CsiError> {
        Self::with_mounter(config, Arc::new(SystemMounter::default()))
    }

    /// Validate `config` and build a driver around a caller-supplied mounter.
    pub fn with_mounter(config: DriverConfig, mounter: Arc<dyn Mounter>) -> Result<Self, CsiError> {
        config.validate()?;
        Ok(Self { config, mounter })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn node_id(&self) -> &str {
        &self.config.node_id
    }

    pub fn plugin_name(&self) -> &str {
        &self.config.plugin_name
    }

    /// Source of every bind mount.
    pub fn workload_api_socket_dir(&self) -> &Path {
        &self.config.workload_api_socket_dir
    }

    pub(crate) fn mounter(&self) -> &dyn Mounter {
        self.mounter.as_ref()
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeMounter;
    use super::*;

    #[test]
    fn new_rejects_incomplete_config() {
        let err = Driver::with_mounter(DriverConfig::new("", "/run/spire"), Arc::new(FakeMounter))
            .unwrap_err();
        assert!(matches!(err, CsiError::Config(_)));
    }

    #[test]
    fn accessors_expose_config() {
        let driver =
            Driver::with_mounter(DriverConfig::new("node-1", "/run/spire"), Arc::new(FakeMounter))
                .unwrap();
        assert_eq!(driver.node_id(), "node-1");
        assert_eq!(driver.plugin_name(), "csi.spiffe.io");
        assert_eq!(driver.workload_api_socket_dir(), Path::new("/run/spire"));
        assert!(format!("{driver:?}").contains("node-1"));
    }
}
