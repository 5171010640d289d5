//! SQLite-backed event storage for valet sessions.
//!
//! This crate persists the session event trail — every user and assistant
//! turn, every tool invocation and its outcome, provider connections, and
//! session lifecycle markers. The trail answers "what did the assistant
//! actually do?" after the fact: which tools ran, with which arguments,
//! and whether they failed.
//!
//! # Core concepts
//!
//! - [`EventStore`] wraps a SQLite database; [`EventStore::append`] writes
//!   one [`Event`], [`EventStore::load_events`] replays a session (with an
//!   optional kind filter), [`EventStore::list_sessions`] summarizes all
//!   sessions.
//! - [`Event`] is one thing that happened: a [`SessionId`], a timestamp,
//!   and an [`EventKind`].
//! - [`SessionId`] is a UUID, displayable and parseable, which is what
//!   makes `valet logs --session <prefix>` work.
//!
//! # Example
//!
//! ```no_run
//! use storage::{Event, EventKind, EventStore, Role, SessionId};
//!
//! let store = EventStore::open("events.db")?;
//!
//! let session_id = SessionId::new();
//! store.append(&Event::new(session_id, EventKind::SessionStart))?;
//! store.append(&Event::message(session_id, Role::User, "any pizza deals today?"))?;
//! store.append(&Event::tool_call(
//!     session_id,
//!     "call-1",
//!     "search_menu",
//!     serde_json::json!({"query": "deals"}),
//! ))?;
//!
//! for event in store.load_events(session_id, Some("tool_call"))? {
//!     println!("{}: {:?}", event.timestamp, event.kind);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind, Role, SessionId};
pub use store::{EventStore, SessionSummary};
