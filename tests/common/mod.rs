#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::Router;
use futures_util::stream::{self, StreamExt};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;

/// Mock service running on its own runtime so tests can drive the blocking
/// client from the test thread.
pub struct MockServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    runtime: Option<Runtime>,
}

impl MockServer {
    pub fn start(app: Router) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("mock server runtime");
        let (addr, shutdown_tx, _task) = runtime.block_on(spawn_server(app));
        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            runtime: Some(runtime),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

pub async fn spawn_server(
    app: Router,
) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server listener");
    let addr = listener
        .local_addr()
        .expect("read mock server listener address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("mock server should run");
    });
    (addr, shutdown_tx, task)
}

/// Streams `chunks` as separate HTTP chunks, `gap` apart. With `hold_open`
/// the response stays open afterwards instead of ending.
pub fn chunked_body(chunks: Vec<String>, gap: Duration, hold_open: bool) -> Body {
    let sent = stream::unfold(chunks.into_iter(), move |mut chunks| async move {
        let chunk = chunks.next()?;
        tokio::time::sleep(gap).await;
        Some((Ok::<Bytes, Infallible>(Bytes::from(chunk)), chunks))
    });

    if hold_open {
        Body::from_stream(sent.chain(stream::pending()))
    } else {
        Body::from_stream(sent)
    }
}

/// Body that never sends anything.
pub fn silent_body() -> Body {
    Body::from_stream(stream::pending::<Result<Bytes, Infallible>>())
}

/// Address nothing is listening on.
pub fn refused_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let addr = listener.local_addr().expect("probe listener address");
    drop(listener);
    format!("http://{addr}")
}

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
