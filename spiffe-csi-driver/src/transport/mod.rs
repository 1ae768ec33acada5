//! gRPC transport for the CSI endpoint.
//!
//! [`CsiServer`] serves the Identity and Node services over a UNIX socket
//! (or any other listener), with [`RpcLoggingLayer`] logging every call.

pub mod logging;
pub mod server;

pub use logging::{RpcLogging, RpcLoggingBody, RpcLoggingLayer};
pub use server::CsiServer;
