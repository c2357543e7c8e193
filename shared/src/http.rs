use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Connection level deadlines applied by [`serve`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timeouts {
    /// Maximum time to receive the request headers (HTTP/1 only).
    pub header_read: Duration,
    /// Maximum time from receiving a request to producing its response.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            header_read: Duration::from_secs(15),
            request: Duration::from_secs(15),
        }
    }
}

pub async fn run_http_service<S, E>(
    host: &str,
    port: u16,
    service: S,
    timeouts: Timeouts,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "listening");
    serve(listener, service, timeouts).await
}

/// Accepts connections from an already bound listener until accepting fails.
pub async fn serve<S, E>(listener: TcpListener, service: S, timeouts: Timeouts) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<io::Error> + std::error::Error + Send + Sync + 'static,
{
    let service_arc = Arc::new(TimeoutService::new(service, timeouts.request));

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            let mut builder = Builder::new(TokioExecutor::new());
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(timeouts.header_read);

            if let Err(e) = builder.serve_connection(io, svc).await {
                tracing::debug!(peer = %peer_addr, error = %e, "connection closed with error");
            }
        });
    }
}

/// Bounds the time a wrapped service may spend on a single request.
///
/// When the deadline passes the request fails with an I/O `TimedOut` error,
/// which makes hyper drop the connection without writing a response.
pub struct TimeoutService<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutService<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl<S, R, E> Service<R> for TimeoutService<S>
where
    S: Service<R, Error = E>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    E: From<io::Error> + Send + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: R) -> Self::Future {
        let timeout = self.timeout;
        let fut = self.inner.call(req);

        Box::pin(async move {
            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "request timed out");
                    Err(io::Error::new(io::ErrorKind::TimedOut, "request timed out").into())
                }
            }
        })
    }
}

pub fn full_body<E: 'static>(bytes: impl Into<Bytes>) -> BoxBody<Bytes, E> {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

/// Builds a response with the status code's canonical reason as a plain text body.
pub fn make_boxed_error_response<E: 'static>(
    status_code: StatusCode,
) -> Response<BoxBody<Bytes, E>> {
    let message = status_code
        .canonical_reason()
        .unwrap_or("an error occurred");

    make_text_response(status_code, message)
}

pub fn make_text_response<E: 'static>(
    status_code: StatusCode,
    message: impl Into<String>,
) -> Response<BoxBody<Bytes, E>> {
    let mut response = Response::new(full_body(message.into()));
    *response.status_mut() = status_code;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    response
}
