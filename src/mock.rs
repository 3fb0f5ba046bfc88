//! A minimal HTTP responder to run load tests against.
//!
//! `GET /api/laptops` (and anything below it) answers with the configured
//! status and a small JSON listing, optionally after a delay and optionally
//! holding the body back after the headers went out. Every other path answers
//! `404 Not Found`.
use std::{
    convert::Infallible,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context as TaskContext, Poll, ready},
};

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{Either, Full};
use hyper::{
    Request, Response, StatusCode,
    body::{Body, Frame, Incoming, SizeHint},
    header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use reqwest::Url;
use tokio::{
    net::TcpListener,
    task::JoinHandle,
    time::{Duration, Sleep},
};
use tokio_util::sync::CancellationToken;

/// Path prefix served by the mock.
pub const MOCK_PATH: &str = "/api/laptops";

const MOCK_BODY: &[u8] = br#"{"items":[],"count":0}"#;

/// How the mock answers requests to [`MOCK_PATH`].
#[derive(Clone, Debug)]
pub struct MockResponse {
    /// Status of every response.
    pub status: StatusCode,
    /// Time to wait before sending the headers.
    pub delay: Duration,
    /// Time to hold the body back once the headers are sent.
    pub body_delay: Duration,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self { status: StatusCode::OK, delay: Duration::ZERO, body_delay: Duration::ZERO }
    }
}

type MockBody = Either<Full<Bytes>, StalledBody>;

/// A body that yields nothing until its stall elapses.
struct StalledBody {
    stall: Pin<Box<Sleep>>,
    inner: Full<Bytes>,
}

impl Body for StalledBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        ready!(self.stall.as_mut().poll(cx));
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// A running mock server. Shut it down with [`MockServer::shutdown`].
pub struct MockServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Binds `addr` and starts serving in the background.
    pub async fn start(addr: SocketAddr, response: MockResponse) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind mock server to {addr}"))?;
        let addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, Arc::new(response), cancel.clone()));

        #[cfg(feature = "tracing")]
        tracing::info!(%addr, "mock server listening");

        Ok(Self { addr, cancel, handle })
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// The url of the mocked endpoint, on the loopback interface.
    pub fn url(&self) -> Url {
        format!("http://127.0.0.1:{}{MOCK_PATH}", self.addr.port())
            .parse()
            .expect("loopback url is valid")
    }

    /// Stops accepting connections and closes the open ones.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn serve(listener: TcpListener, response: Arc<MockResponse>, cancel: CancellationToken) {
    loop {
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("mock server failed to accept connection: {_e}");
                    continue;
                }
            },
        };

        let response = response.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| {
                let response = response.clone();
                async move { respond(req, &response).await }
            });

            tokio::select! {
                _ = cancel.cancelled() => (),
                _res = http1::Builder::new().serve_connection(io, service) => {
                    #[cfg(feature = "tracing")]
                    if let Err(e) = _res {
                        tracing::debug!("mock connection error: {e}");
                    }
                }
            }
        });
    }
}

async fn respond(req: Request<Incoming>, response: &MockResponse) -> Result<Response<MockBody>, Infallible> {
    if !req.uri().path().starts_with(MOCK_PATH) {
        let mut resp = Response::new(Either::Left(Full::new(Bytes::new())));
        *resp.status_mut() = StatusCode::NOT_FOUND;
        return Ok(resp);
    }

    if !response.delay.is_zero() {
        tokio::time::sleep(response.delay).await;
    }

    let body = Full::new(Bytes::from_static(MOCK_BODY));
    let body = if response.body_delay.is_zero() {
        Either::Left(body)
    } else {
        Either::Right(StalledBody { stall: Box::pin(tokio::time::sleep(response.body_delay)), inner: body })
    };

    let mut resp = Response::new(body);
    *resp.status_mut() = response.status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, MOCK_BODY.len().into());
    Ok(resp)
}
