use tokio::sync::{mpsc, oneshot, watch};
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::error::SubmitError;
use crate::session::{ConnectionStatus, Session, SessionView};
use crate::transport::{self, TransportEvent, TransportHandle};

/// Tunables for a spawned session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Transport events buffered before the I/O task waits on the session.
    pub event_capacity: usize,
    /// Commands buffered before callers wait on the session.
    pub command_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            event_capacity: 64,
            command_capacity: 64,
        }
    }
}

/// Everything that mutates a session goes through this one queue.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Transport(TransportEvent),
    Submit {
        text: String,
        respond_to: oneshot::Sender<Result<u64, SubmitError>>,
    },
    Shutdown {
        respond_to: oneshot::Sender<bool>,
    },
}

/// Handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    sender: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Submit a user turn. Resolves once the entry is in the log and the
    /// frame is queued; it does not wait for a reply.
    pub async fn submit(&self, text: impl Into<String>) -> Result<u64, SubmitError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Submit {
                text: text.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| SubmitError::SessionGone)?;
        rx.await.map_err(|_| SubmitError::SessionGone)?
    }

    /// Watch the session's state. The receiver sees a new value after every
    /// transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Close the connection and stop the actor. Returns `false` when the
    /// session was already shut down.
    pub async fn shutdown(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionCommand::Shutdown { respond_to: tx })
            .await
            .is_err()
        {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Wait until the session reaches `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.view.clone();
        // An Err means the actor is gone, which also means closed.
        let _ = rx
            .wait_for(|v| v.status == ConnectionStatus::Closed)
            .await;
    }
}

/// Connect to `url` and start a session actor for it.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(url: impl Into<String>, options: SessionOptions) -> SessionHandle {
    let (transport, events) = transport::connect(url, options.event_capacity);
    spawn_with_transport(transport, events, options)
}

/// Start a session actor over an already-created transport.
pub fn spawn_with_transport(
    transport: TransportHandle,
    mut events: mpsc::Receiver<TransportEvent>,
    options: SessionOptions,
) -> SessionHandle {
    let session = Session::new();
    let id = session.id();
    let (sender, receiver) = mpsc::channel(options.command_capacity.max(1));
    let (view_tx, view_rx) = watch::channel(session.view());

    // Funnel transport events into the command queue so they interleave with
    // submissions in arrival order. The forwarder holds only a weak sender so
    // dropping every handle still ends the actor.
    let forward = sender.downgrade();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let terminal = event == TransportEvent::Closed;
            let Some(forward) = forward.upgrade() else {
                break;
            };
            if forward.send(SessionCommand::Transport(event)).await.is_err() {
                break;
            }
            if terminal {
                break;
            }
        }
    });

    let actor = SessionActor {
        session,
        transport,
        receiver,
        view: view_tx,
    };
    tokio::spawn(actor.run().instrument(info_span!("session", id = %id)));

    SessionHandle {
        id,
        sender,
        view: view_rx,
    }
}

struct SessionActor {
    session: Session,
    transport: TransportHandle,
    receiver: mpsc::Receiver<SessionCommand>,
    view: watch::Sender<SessionView>,
}

impl SessionActor {
    async fn run(mut self) {
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Transport(event) => {
                    if self.session.handle_transport_event(event) {
                        self.publish();
                    }
                }
                SessionCommand::Submit { text, respond_to } => {
                    let before = self.session.entries().len();
                    let result = self.session.submit(&text, &mut self.transport);
                    if self.session.entries().len() != before {
                        self.publish();
                    }
                    let _ = respond_to.send(result);
                }
                SessionCommand::Shutdown { respond_to } => {
                    let first = self.transport.close();
                    if self.session.handle_transport_event(TransportEvent::Closed) {
                        self.publish();
                    }
                    let _ = respond_to.send(first);
                    break;
                }
            }
        }
        // Dropping the last handle also tears the connection down.
        self.transport.close();
        debug!("session actor stopped");
    }

    fn publish(&self) {
        self.view.send_replace(self.session.view());
    }
}
