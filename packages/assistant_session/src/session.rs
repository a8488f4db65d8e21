//! Session State Machine
//!
//! Folds transport events and user submissions into an ordered conversation
//! log, a transient progress indicator, and the connection status.
//!
//! ```text
//! Connecting ──Opened──▶ Open ──Closed/Error──▶ Closed
//!      └──────────────Closed/Error─────────────────▲
//! ```
//!
//! `Closed` is absorbing. Input is enabled exactly when the session is
//! `Open` and no progress indicator is alive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SubmitError;
use crate::protocol::{self, InboundMessage, MeetingStatus, OutboundMessage};
use crate::transport::{FrameSink, TransportEvent};
use crate::welcome::welcome_message;

/// Prefix for service-reported errors shown in the log.
pub const ERROR_PREFIX: &str = "An error occurred: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Open,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Open => write!(f, "open"),
            ConnectionStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// One line of the conversation. Never changes after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// Assigned in append order, starting at 1.
    pub id: u64,
    pub author: Author,
    /// May contain markup; rendering is the presenter's business.
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The single in-flight progress indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub body: String,
}

impl ProgressState {
    /// Provisioning step, when the body uses the service's status format.
    pub fn status(&self) -> Option<MeetingStatus> {
        MeetingStatus::from_progress_text(&self.body)
    }
}

/// Read-only snapshot for the presentation layer. Entries are shared with
/// the session, so taking a snapshot never copies message bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionView {
    pub entries: Vec<Arc<ConversationEntry>>,
    pub progress: Option<ProgressState>,
    pub status: ConnectionStatus,
    pub input_enabled: bool,
}

/// State for one connection's worth of conversation.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    entries: Vec<Arc<ConversationEntry>>,
    progress: Option<ProgressState>,
    status: ConnectionStatus,
    next_entry_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            entries: Vec::new(),
            progress: None,
            status: ConnectionStatus::Connecting,
            next_entry_id: 1,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entries(&self) -> &[Arc<ConversationEntry>] {
        &self.entries
    }

    pub fn progress(&self) -> Option<&ProgressState> {
        self.progress.as_ref()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn input_enabled(&self) -> bool {
        self.status == ConnectionStatus::Open && self.progress.is_none()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            entries: self.entries.clone(),
            progress: self.progress.clone(),
            status: self.status,
            input_enabled: self.input_enabled(),
        }
    }

    /// Apply a transport lifecycle event. Returns whether observable state changed.
    pub fn handle_transport_event(&mut self, event: TransportEvent) -> bool {
        match event {
            TransportEvent::Opened => {
                if self.status != ConnectionStatus::Connecting {
                    debug!(status = %self.status, "ignoring open outside of connecting");
                    return false;
                }
                info!(session_id = %self.id, "session open");
                self.status = ConnectionStatus::Open;
                self.append(Author::Assistant, welcome_message(), None);
                true
            }
            TransportEvent::Message(frame) => match protocol::decode(&frame) {
                Ok(message) => self.apply_inbound(message),
                Err(e) => {
                    warn!(error = %e, frame_len = frame.len(), "dropping undecodable frame");
                    false
                }
            },
            TransportEvent::Error(reason) => {
                if self.status == ConnectionStatus::Closed {
                    return false;
                }
                warn!(session_id = %self.id, reason = %reason, "transport error");
                self.close();
                true
            }
            TransportEvent::Closed => {
                if self.status == ConnectionStatus::Closed {
                    return false;
                }
                info!(session_id = %self.id, "session closed");
                self.close();
                true
            }
        }
    }

    /// Apply a decoded inbound message. Only meaningful while open.
    pub fn apply_inbound(&mut self, message: InboundMessage) -> bool {
        if self.status != ConnectionStatus::Open {
            debug!(
                status = %self.status,
                response_type = message.response_type().as_str(),
                "ignoring message outside of open"
            );
            return false;
        }

        let link = message.action_link().map(str::to_owned);
        match message {
            InboundMessage::ConnectionProgress { text, .. } => match link {
                None => {
                    debug!(body = %text, "progress update");
                    self.progress = Some(ProgressState { body: text });
                }
                Some(link) => {
                    debug!(link = %link, "progress finished with an action link");
                    self.progress = None;
                    self.append(Author::Assistant, text, Some(link));
                }
            },
            // Narration may arrive mid-cycle, so the indicator stays.
            InboundMessage::AssistantResponse { text, .. } => {
                self.append(Author::Assistant, text, link);
            }
            InboundMessage::Error { text, .. } => {
                self.progress = None;
                self.append(Author::Assistant, format!("{ERROR_PREFIX}{text}"), None);
            }
        }
        true
    }

    /// Record the user's turn and forward it.
    ///
    /// Refusals leave the log untouched and send nothing. A failed send
    /// keeps the entry: the turn happened, the connection did not carry it.
    pub fn submit(&mut self, text: &str, sink: &mut impl FrameSink) -> Result<u64, SubmitError> {
        if self.status != ConnectionStatus::Open {
            return Err(SubmitError::NotOpen(self.status));
        }
        if self.progress.is_some() {
            return Err(SubmitError::InputDisabled);
        }
        if text.trim().is_empty() {
            return Err(SubmitError::EmptyText);
        }

        self.progress = None;
        let id = self.append(Author::User, text.to_string(), None);
        sink.send_text(OutboundMessage::new(text).encode())?;
        Ok(id)
    }

    fn close(&mut self) {
        self.progress = None;
        self.status = ConnectionStatus::Closed;
    }

    fn append(&mut self, author: Author, body: String, action_link: Option<String>) -> u64 {
        let id = self.next_entry_id;
        self.next_entry_id += 1;
        self.entries.push(Arc::new(ConversationEntry {
            id,
            author,
            body,
            action_link,
            created_at: Utc::now(),
        }));
        id
    }
}
