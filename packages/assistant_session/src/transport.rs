//! WebSocket Transport
//!
//! Owns one connection to the assistant service. A background I/O task holds
//! the socket; the [`TransportHandle`] only queues outbound frames and
//! requests shutdown. Lifecycle events flow out through a single channel in
//! this order: exactly one of `Opened` / `Error`, then any number of
//! `Message`s, then exactly one `Closed`.
//!
//! Nothing here interprets frames or retries. Reconnecting means building a
//! new handle.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tracing::{debug, info, warn};

use crate::error::{DecodeError, TransportError};

/// Lifecycle events delivered by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is established.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The connection failed, either while connecting or mid-session.
    Error(String),
    /// Terminal event. Nothing follows it.
    Closed,
}

/// Outbound half of a transport, as seen by the session state machine.
pub trait FrameSink {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError>;
}

const STATE_CONNECTING: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSED: u8 = 2;

enum Outbound {
    Text(String),
    Close,
}

struct Shared {
    state: AtomicU8,
    close_requested: AtomicBool,
}

/// Handle to a live connection. Cloning shares the same connection.
#[derive(Clone)]
pub struct TransportHandle {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl TransportHandle {
    pub fn is_open(&self) -> bool {
        self.shared.state.load(Ordering::Acquire) == STATE_OPEN
    }

    /// Queue a text frame. Fails unless the connection is open.
    pub fn send_text(&self, frame: String) -> Result<(), TransportError> {
        match self.shared.state.load(Ordering::Acquire) {
            STATE_CONNECTING => Err(TransportError::NotOpen),
            STATE_OPEN => self
                .outbound
                .send(Outbound::Text(frame))
                .map_err(|_| TransportError::Closed),
            _ => Err(TransportError::Closed),
        }
    }

    /// Close the connection. Returns `false` if it was already closed by this
    /// or another clone of the handle.
    pub fn close(&self) -> bool {
        if self.shared.close_requested.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shared.state.store(STATE_CLOSED, Ordering::Release);
        // The I/O task may already be gone; nothing left to tell it then.
        let _ = self.outbound.send(Outbound::Close);
        true
    }
}

impl FrameSink for TransportHandle {
    fn send_text(&mut self, frame: String) -> Result<(), TransportError> {
        TransportHandle::send_text(self, frame)
    }
}

/// Open a WebSocket connection to `url` on a background task.
///
/// Must be called from within a tokio runtime.
pub fn connect(
    url: impl Into<String>,
    event_capacity: usize,
) -> (TransportHandle, mpsc::Receiver<TransportEvent>) {
    let shared = Arc::new(Shared {
        state: AtomicU8::new(STATE_CONNECTING),
        close_requested: AtomicBool::new(false),
    });
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(event_capacity.max(1));

    tokio::spawn(run_connection(
        url.into(),
        shared.clone(),
        outbound_rx,
        event_tx,
    ));

    (
        TransportHandle {
            shared,
            outbound: outbound_tx,
        },
        event_rx,
    )
}

async fn run_connection(
    url: String,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::Sender<TransportEvent>,
) {
    debug!(url = %url, "connecting");

    let connect = tokio_tungstenite::connect_async(url.as_str());
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    let err = TransportError::from_tungstenite(e);
                    warn!(url = %url, error = %err, "connect failed");
                    shared.state.store(STATE_CLOSED, Ordering::Release);
                    let _ = events.send(TransportEvent::Error(err.to_string())).await;
                    let _ = events.send(TransportEvent::Closed).await;
                    return;
                }
            },
            cmd = outbound_rx.recv() => match cmd {
                // send_text refuses frames before open, so only a close can land here.
                Some(Outbound::Text(_)) => continue,
                Some(Outbound::Close) | None => {
                    debug!(url = %url, "closed before the connection opened");
                    shared.state.store(STATE_CLOSED, Ordering::Release);
                    emit_closed_before_open(&events).await;
                    return;
                }
            },
        }
    };

    // Only a handle still in Connecting may become Open; losing the exchange
    // means close() got there first.
    if shared
        .state
        .compare_exchange(STATE_CONNECTING, STATE_OPEN, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!(url = %url, "close raced the handshake");
        let mut ws_stream = ws_stream;
        let _ = ws_stream.close(None).await;
        emit_closed_before_open(&events).await;
        return;
    }

    info!(url = %url, "connection open");
    if events.send(TransportEvent::Opened).await.is_err() {
        shared.state.store(STATE_CLOSED, Ordering::Release);
        return;
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = outbound_rx.recv() => match cmd {
                Some(Outbound::Text(frame)) => {
                    if let Err(e) = ws_write.send(tungstenite::Message::Text(frame.into())).await {
                        let err = TransportError::from_tungstenite(e);
                        warn!(error = %err, "send failed");
                        shared.state.store(STATE_CLOSED, Ordering::Release);
                        let _ = events.send(TransportEvent::Error(err.to_string())).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    debug!("closing connection");
                    let _ = ws_write.send(tungstenite::Message::Close(None)).await;
                    let _ = ws_write.close().await;
                    break;
                }
            },

            msg = ws_read.next() => match msg {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    if events.send(TransportEvent::Message(text.as_str().to_owned())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(tungstenite::Message::Binary(data))) => {
                    warn!(error = %DecodeError::Binary, len = data.len(), "dropping binary frame");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    info!(frame = ?frame, "remote closed the connection");
                    break;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let err = TransportError::from_tungstenite(e);
                    warn!(error = %err, "receive failed");
                    shared.state.store(STATE_CLOSED, Ordering::Release);
                    let _ = events.send(TransportEvent::Error(err.to_string())).await;
                    break;
                }
                None => {
                    debug!("connection stream ended");
                    break;
                }
            },
        }
    }

    shared.state.store(STATE_CLOSED, Ordering::Release);
    let _ = events.send(TransportEvent::Closed).await;
}

async fn emit_closed_before_open(events: &mpsc::Sender<TransportEvent>) {
    let _ = events
        .send(TransportEvent::Error(TransportError::ClosedBeforeOpen.to_string()))
        .await;
    let _ = events.send(TransportEvent::Closed).await;
}
