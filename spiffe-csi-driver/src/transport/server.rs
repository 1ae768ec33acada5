//! gRPC server that exposes the Identity and Node services of a [`Driver`]
//! on the CSI endpoint.

use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::transport::server::Connected;
use tracing::{debug, info, instrument, warn};

use super::logging::RpcLoggingLayer;
use crate::csi::identity_server::IdentityServer;
use crate::csi::node_server::NodeServer;
use crate::driver::Driver;
use crate::error::CsiError;

/// Serves one [`Driver`] as both the Identity and the Node service.
#[derive(Debug, Clone)]
pub struct CsiServer {
    driver: Arc<Driver>,
}

impl CsiServer {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Listen on the UNIX socket at `socket_path` until `shutdown` resolves.
    ///
    /// A socket file left behind by a previous run is removed first.
    #[instrument(skip(self, shutdown), fields(socket_path = %socket_path.display()))]
    pub async fn serve_unix<F>(&self, socket_path: &Path, shutdown: F) -> Result<(), CsiError>
    where
        F: Future<Output = ()>,
    {
        if socket_path.as_os_str().is_empty() {
            return Err(CsiError::Config("CSI socket path is required".into()));
        }

        remove_stale_socket(socket_path).await;

        let listener = UnixListener::bind(socket_path).map_err(|e| {
            CsiError::Transport(format!("unable to listen on {}: {e}", socket_path.display()))
        })?;
        info!("CSI server listening");

        self.serve_with_incoming(UnixListenerStream::new(listener), shutdown)
            .await
    }

    /// Serve connections from `incoming` until `shutdown` resolves, then
    /// drain in-flight RPCs.
    pub async fn serve_with_incoming<I, IO, IE, F>(
        &self,
        incoming: I,
        shutdown: F,
    ) -> Result<(), CsiError>
    where
        I: Stream<Item = Result<IO, IE>>,
        IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
        IO::ConnectInfo: Clone + Send + Sync + 'static,
        IE: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: Future<Output = ()>,
    {
        Server::builder()
            .layer(RpcLoggingLayer::new())
            .add_service(IdentityServer::from_arc(Arc::clone(&self.driver)))
            .add_service(NodeServer::from_arc(Arc::clone(&self.driver)))
            .serve_with_incoming_shutdown(incoming, shutdown)
            .await
            .map_err(CsiError::transport)?;

        info!("CSI server stopped");
        Ok(())
    }
}

async fn remove_stale_socket(socket_path: &Path) {
    match tokio::fs::remove_file(socket_path).await {
        Ok(()) => debug!("removed stale socket"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, "unable to remove stale socket"),
    }
}
