//! WebSocket front of an [`EventStore`].
//!
//! - `GET /stream` ingests JSON [`Stream`](crate::Stream) frames.
//! - `GET /subscribe` pushes JSON arrays of [`Message`](crate::Message) for the
//!   rules set by a `subscription` control frame.
//!
//! Every connection runs one reader and one writer task. On shutdown each
//! writer sends a close frame, readers get a short grace period to finish
//! the frame they are handling, and `serve` returns once the connection
//! tracker has drained.

mod config;
mod session;

pub use config::{ServerConfig, DEFAULT_ADDRESS, DEFAULT_STORAGE};
pub use session::{Ingest, Session, Subscription, OK};

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_util::task::task_tracker::TaskTrackerToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::store::EventStore;

const READ_GRACE: Duration = Duration::from_secs(2);

struct Shared {
    store: EventStore,
    stop: watch::Receiver<bool>,
    /// Every live connection and its reader and writer tasks.
    connections: TaskTracker,
}

pub struct Server {
    store: EventStore,
}

impl Server {
    pub fn new(store: EventStore) -> Self {
        Server { store }
    }

    /// Serves until `signal` resolves, then closes every connection and
    /// waits for them to drain.
    pub async fn serve(
        self,
        listener: TcpListener,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let connections = TaskTracker::new();
        let shared = Arc::new(Shared {
            store: self.store,
            stop: stop_rx,
            connections: connections.clone(),
        });
        let app = router(shared);

        if let Ok(address) = listener.local_addr() {
            info!(%address, "listening");
        }
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.await;
                info!("shutting down, closing connections");
                let _ = stop_tx.send(true);
            })
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        // Upgrades take their token inside the HTTP handler, which axum has
        // already waited for, so nothing joins the tracker after it closes.
        connections.close();
        debug!(open = connections.len(), "waiting for connections");
        connections.wait().await;
        info!("all connections drained");
        Ok(())
    }
}

fn router(shared: Arc<Shared>) -> Router {
    Router::new()
        .route("/stream", get(stream_socket))
        .route("/subscribe", get(subscribe_socket))
        .with_state(shared)
}

async fn stream_socket(ws: WebSocketUpgrade, State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    let token = shared.connections.token();
    ws.on_upgrade(|socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Ingest::new(shared.store.clone(), tx);
        connection(socket, shared, token, session, rx, "stream").await
    })
}

async fn subscribe_socket(ws: WebSocketUpgrade, State(shared): State<Arc<Shared>>) -> impl IntoResponse {
    let token = shared.connections.token();
    ws.on_upgrade(|socket| async move {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Subscription::new(shared.store.clone(), tx);
        connection(socket, shared, token, session, rx, "subscribe").await
    })
}

async fn connection<S: Session>(
    socket: WebSocket,
    shared: Arc<Shared>,
    token: TaskTrackerToken,
    session: S,
    mut outbound: mpsc::UnboundedReceiver<String>,
    endpoint: &'static str,
) {
    debug!(endpoint, "connection established");
    let (mut sink, mut frames) = socket.split();
    let mut stop = shared.stop.clone();

    let mut writer = shared.connections.spawn(async move {
        loop {
            tokio::select! {
                _ = stop.changed() => {
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: Cow::from("server shutdown"),
                    };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                }
                next = outbound.recv() => match next {
                    Some(text) => {
                        if let Err(err) = sink.send(Message::Text(text.into())).await {
                            debug!(endpoint, %err, "write failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    let mut reader = shared.connections.spawn(async move {
        let mut session = session;
        while let Some(frame) = frames.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text.to_string(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(err) => {
                    debug!(endpoint, %err, "read failed");
                    break;
                }
            };
            // Appends block on storage, keep them off the runtime threads.
            let handled = tokio::task::spawn_blocking(move || {
                let result = session.receive(&text);
                (session, result)
            })
            .await;
            match handled {
                Ok((returned, result)) => {
                    session = returned;
                    if let Err(err) = result {
                        error!(endpoint, %err, "frame rejected");
                    }
                }
                Err(err) => {
                    error!(endpoint, %err, "session task failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut reader => writer.abort(),
        _ = &mut writer => {
            if tokio::time::timeout(READ_GRACE, &mut reader).await.is_err() {
                reader.abort();
            }
        }
    }
    drop(token);
    debug!(endpoint, "connection closed");
}
