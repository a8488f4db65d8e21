//! Assistant Session - client-side core of the meeting assistant chat
//!
//! Speaks the assistant service's WebSocket protocol and folds what it hears
//! into presentable state: an ordered conversation log, a transient progress
//! indicator, and whether the user may type. It has no terminal or UI
//! knowledge; a presenter subscribes to [`SessionView`] snapshots and feeds
//! user text back through [`SessionHandle::submit`].
//!
//! # Example
//!
//! ```no_run
//! use assistant_session::{SessionOptions, spawn_session};
//!
//! #[tokio::main]
//! async fn main() {
//!     let session = spawn_session("ws://localhost:8000/ws", SessionOptions::default());
//!     let mut views = session.subscribe();
//!
//!     // Wait for the welcome message
//!     views.wait_for(|v| v.input_enabled).await.unwrap();
//!     session.submit("Invite the business coach").await.unwrap();
//!
//!     while views.changed().await.is_ok() {
//!         let view = views.borrow_and_update().clone();
//!         if let Some(progress) = &view.progress {
//!             println!("... {}", progress.body);
//!         }
//!         if let Some(entry) = view.entries.last() {
//!             if let Some(link) = &entry.action_link {
//!                 println!("join: {link}");
//!                 break;
//!             }
//!         }
//!     }
//!     session.shutdown().await;
//! }
//! ```

mod actor;
mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod welcome;

pub use actor::{SessionHandle, SessionOptions, spawn_session, spawn_with_transport};
pub use error::{DecodeError, SubmitError, TransportError};
pub use protocol::{InboundMessage, MeetingStatus, OutboundMessage, ResponseType, decode};
pub use session::{Author, ConnectionStatus, ConversationEntry, ProgressState, Session, SessionView};
pub use transport::{FrameSink, TransportEvent, TransportHandle};
pub use welcome::{Persona, welcome_message};
