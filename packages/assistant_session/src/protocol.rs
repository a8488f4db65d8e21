//! Wire Protocol Types
//!
//! JSON text frames exchanged with the assistant service. Inbound frames are
//! tagged by `response_type`; outbound frames carry only the user's text.
//!
//! Decoding is defensive: the service may grow new message kinds, so anything
//! this client does not understand comes back as a [`DecodeError`] for the
//! caller to log and drop rather than tearing the session down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Discriminant of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    ConnectionProgress,
    AssistantResponse,
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::ConnectionProgress => "connection_progress",
            ResponseType::AssistantResponse => "assistant_response",
            ResponseType::Error => "error",
        }
    }

    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "connection_progress" => Some(ResponseType::ConnectionProgress),
            "assistant_response" => Some(ResponseType::AssistantResponse),
            "error" => Some(ResponseType::Error),
            _ => None,
        }
    }
}

/// Messages sent FROM the service TO this client.
///
/// Frames may also carry a `role` field (always `"assistant"` today); it is
/// accepted and ignored along with any other unknown field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Interim status of background work, or its completion when a link is attached.
    ConnectionProgress {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gm_link: Option<String>,
    },
    /// A conversational reply.
    AssistantResponse {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gm_link: Option<String>,
    },
    /// An in-band failure reported by the service.
    Error {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gm_link: Option<String>,
    },
}

impl InboundMessage {
    pub fn response_type(&self) -> ResponseType {
        match self {
            InboundMessage::ConnectionProgress { .. } => ResponseType::ConnectionProgress,
            InboundMessage::AssistantResponse { .. } => ResponseType::AssistantResponse,
            InboundMessage::Error { .. } => ResponseType::Error,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            InboundMessage::ConnectionProgress { text, .. }
            | InboundMessage::AssistantResponse { text, .. }
            | InboundMessage::Error { text, .. } => text,
        }
    }

    /// The action link, if present and non-empty.
    pub fn action_link(&self) -> Option<&str> {
        let link = match self {
            InboundMessage::ConnectionProgress { gm_link, .. }
            | InboundMessage::AssistantResponse { gm_link, .. }
            | InboundMessage::Error { gm_link, .. } => gm_link.as_deref(),
        };
        link.filter(|l| !l.is_empty())
    }
}

/// Messages sent FROM this client TO the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub text: String,
}

impl OutboundMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn encode(&self) -> String {
        // A struct holding one String cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Parse one inbound text frame.
///
/// The tag is inspected before the body so an unknown `response_type` is
/// reported as such instead of as a generic shape mismatch.
pub fn decode(frame: &str) -> Result<InboundMessage, DecodeError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let Some(object) = value.as_object() else {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    };

    let tag = match object.get("response_type") {
        None | Some(Value::Null) => return Err(DecodeError::MissingResponseType),
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => {
            return Err(DecodeError::Malformed(format!(
                "response_type is not a string: {other}"
            )));
        }
    };

    if ResponseType::from_wire(&tag).is_none() {
        return Err(DecodeError::UnknownResponseType(tag));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Steps the service reports while provisioning a meeting.
///
/// Progress frames carry text of the form `"<status>: <description>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    ContainerStarting,
    NewMeetingStarting,
    LifeAgentLoading,
    Error,
    MeetingReady,
    WaitingForApprove,
    ConnectingToTheMeeting,
    Ready,
}

impl MeetingStatus {
    pub const ALL: [MeetingStatus; 8] = [
        MeetingStatus::ContainerStarting,
        MeetingStatus::NewMeetingStarting,
        MeetingStatus::LifeAgentLoading,
        MeetingStatus::Error,
        MeetingStatus::MeetingReady,
        MeetingStatus::WaitingForApprove,
        MeetingStatus::ConnectingToTheMeeting,
        MeetingStatus::Ready,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::ContainerStarting => "container_starting",
            MeetingStatus::NewMeetingStarting => "new_meeting_starting",
            MeetingStatus::LifeAgentLoading => "life_agent_loading",
            MeetingStatus::Error => "error",
            MeetingStatus::MeetingReady => "meeting_ready",
            MeetingStatus::WaitingForApprove => "waiting_for_approve",
            MeetingStatus::ConnectingToTheMeeting => "connecting_to_the_meeting",
            MeetingStatus::Ready => "ready",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MeetingStatus::ContainerStarting => "The container is starting up",
            MeetingStatus::NewMeetingStarting => "A new meeting is being initialized",
            MeetingStatus::LifeAgentLoading => "The live agent is currently loading",
            MeetingStatus::Error => "An error has occurred",
            MeetingStatus::MeetingReady => "The meeting is ready to join",
            MeetingStatus::WaitingForApprove => "Waiting for approval to proceed",
            MeetingStatus::ConnectingToTheMeeting => "Connecting to the meeting",
            MeetingStatus::Ready => "System is fully ready",
        }
    }

    /// Recover the status from a progress body, if it uses the service's format.
    pub fn from_progress_text(text: &str) -> Option<Self> {
        let (prefix, _) = text.split_once(':')?;
        let prefix = prefix.trim();
        Self::ALL.into_iter().find(|s| s.as_str() == prefix)
    }
}
