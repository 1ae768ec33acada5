//! # spiffe-csi-driver: Workload API socket delivery over CSI
//!
//! `spiffe-csi-driver` is a node-local [Container Storage Interface][csi]
//! plugin.  Instead of provisioning storage it bind-mounts one fixed host
//! directory, the SPIFFE Workload API socket directory, into every pod that
//! requests an ephemeral inline volume from it.  The gRPC surface is served
//! with `tonic` on a UNIX socket; everything runs on Tokio, logs through
//! `tracing` and reports failures as `thiserror` enums.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`csi`] | CSI v1 types and services generated from `proto/csi.proto`. |
//! | [`config`] | [`DriverConfig`] and the command line. |
//! | [`error`] | [`CsiError`] and its mapping onto gRPC status codes. |
//! | [`validation`] | Publish/unpublish request checks. |
//! | [`mount`] | [`Mounter`] trait, Linux backend, mount-table parser. |
//! | [`driver`] | [`Driver`]: configuration plus mount backend. |
//! | [`identity`] | Identity service for [`Driver`]. |
//! | [`node`] | Node service for [`Driver`]: publish, unpublish, health. |
//! | [`transport`] | UNIX-socket server and per-RPC logging layer. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod config;
pub mod csi;
pub mod driver;
pub mod error;
pub mod identity;
pub mod mount;
pub mod node;
pub mod transport;
pub mod validation;

pub use config::DriverConfig;
pub use driver::Driver;
pub use error::CsiError;
pub use identity::VENDOR_VERSION;
pub use mount::{MountError, Mounter, SystemMounter};
pub use transport::{CsiServer, RpcLoggingLayer};
