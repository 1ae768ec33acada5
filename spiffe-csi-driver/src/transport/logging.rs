//! Per-RPC logging as a `tower` layer.
//!
//! [`RpcLoggingLayer`] wraps the whole gRPC router.  Every call is passed
//! through untouched; once the outcome is known it is logged with the
//! method path: failures at `error`, successes at `debug`.
//!
//! A handler that returns an error before sending anything produces a
//! trailers-only response, so its `grpc-status` is in the response headers
//! and is logged as soon as the handler returns.  Otherwise the status
//! arrives in the trailers at the end of the body; the body is wrapped in
//! [`RpcLoggingBody`] and the outcome is logged when those trailers pass.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderMap, Request, Response};
use http_body::{Body, Frame, SizeHint};
use tonic::{Code, Status};
use tower::{Layer, Service};
use tracing::{debug, error};

/// Layer producing [`RpcLogging`] services.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcLoggingLayer;

impl RpcLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RpcLoggingLayer {
    type Service = RpcLogging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcLogging { inner }
    }
}

/// Service logging the outcome of each RPC handled by `S`.
#[derive(Debug, Clone)]
pub struct RpcLogging<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RpcLogging<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
{
    type Response = Response<RpcLoggingBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let method = request.uri().path().to_owned();
        let fut = self.inner.call(request);

        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    // trailers-only: the outcome is already known
                    let pending = match rpc_status(response.headers()) {
                        Some(status) => {
                            log_outcome(&method, Some(status));
                            None
                        }
                        None => Some(method),
                    };
                    Ok(response.map(|inner| RpcLoggingBody {
                        inner,
                        method: pending,
                    }))
                }
                Err(e) => {
                    error!(%method, "RPC failed in transport");
                    Err(e)
                }
            }
        })
    }
}

/// Response body that logs the RPC outcome carried in its trailers.
///
/// A body that ends without trailers is logged as a success.
#[derive(Debug)]
pub struct RpcLoggingBody<B> {
    inner: B,
    /// Method path while the outcome is still unlogged.
    method: Option<String>,
}

impl<B> RpcLoggingBody<B> {
    pub fn get_ref(&self) -> &B {
        &self.inner
    }

    fn finish(&mut self, status: Option<Status>) {
        if let Some(method) = self.method.take() {
            log_outcome(&method, status);
        }
    }
}

impl<B> Body for RpcLoggingBody<B>
where
    B: Body + Unpin,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(trailers) = frame.trailers_ref() {
                    this.finish(rpc_status(trailers));
                }
            }
            Poll::Ready(Some(Err(_))) => {
                if let Some(method) = this.method.take() {
                    error!(%method, "RPC failed while streaming the response");
                }
            }
            Poll::Ready(None) => this.finish(None),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

fn log_outcome(method: &str, status: Option<Status>) {
    match status {
        Some(status) => error!(
            %method,
            code = ?status.code(),
            error = %status.message(),
            "RPC failed"
        ),
        None => debug!(%method, "RPC succeeded"),
    }
}

/// The error status carried in `headers`, if any.
fn rpc_status(headers: &HeaderMap) -> Option<Status> {
    Status::from_header_map(headers).filter(|status| status.code() != Code::Ok)
}
