use tokio_tungstenite::tungstenite;

use crate::session::ConnectionStatus;

/// Failures of the underlying connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The handle exists but the socket has not finished opening.
    #[error("connection is not open")]
    NotOpen,

    /// The handle was torn down or the remote side went away.
    #[error("connection is closed")]
    Closed,

    /// `close()` landed while the handshake was still in flight.
    #[error("connection closed before it opened")]
    ClosedBeforeOpen,

    /// The remote endpoint could not be reached.
    #[error("service is unavailable: {0}")]
    Connect(String),

    #[error("transport I/O failed: {0}")]
    Io(String),
}

impl TransportError {
    /// Refused/reset/aborted sockets mean the service is unreachable; everything
    /// else is an I/O failure on an otherwise reachable endpoint.
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        match &err {
            tungstenite::Error::Io(io_err)
                if matches!(
                    io_err.kind(),
                    std::io::ErrorKind::ConnectionRefused
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                ) =>
            {
                Self::Connect(err.to_string())
            }
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Why an inbound frame was discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("frame has no response_type")]
    MissingResponseType,

    #[error("unknown response_type: {0}")]
    UnknownResponseType(String),

    #[error("binary frames are not part of the protocol")]
    Binary,
}

/// Why a user submission was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// A progress cycle is active.
    #[error("input is disabled while the assistant is working")]
    InputDisabled,

    #[error("session is {0}, not open")]
    NotOpen(ConnectionStatus),

    #[error("message is empty")]
    EmptyText,

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The session actor has already stopped.
    #[error("session has ended")]
    SessionGone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_connection_is_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = TransportError::from_tungstenite(tungstenite::Error::Io(io));
        assert!(matches!(err, TransportError::Connect(_)));
    }

    #[test]
    fn test_other_io_is_io() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err = TransportError::from_tungstenite(tungstenite::Error::Io(io));
        assert!(matches!(err, TransportError::Io(_)));
    }

    #[test]
    fn test_already_closed_maps_to_closed() {
        let err = TransportError::from_tungstenite(tungstenite::Error::AlreadyClosed);
        assert_eq!(err, TransportError::Closed);
    }

    #[test]
    fn test_submit_error_messages() {
        assert_eq!(
            SubmitError::NotOpen(ConnectionStatus::Closed).to_string(),
            "session is closed, not open"
        );
        assert_eq!(
            SubmitError::from(TransportError::NotOpen).to_string(),
            "connection is not open"
        );
    }
}
