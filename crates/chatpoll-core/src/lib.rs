//! Core types and error definitions for the chatpoll client.
//!
//! This crate provides the data model shared by the polling engine and its
//! front-ends: messages, sessions, request bodies and the error taxonomy.
//!
//! # Main types
//!
//! - [`ChatError`] — Unified error enum for every client operation.
//! - [`ChatResult`] — Convenience alias for `Result<T, ChatError>`.
//! - [`ChatMessage`] — A message delivered by the polling stream.
//! - [`Sender`] — Who authored a message (user or agent).
//! - [`ChatSession`] — A server-side conversation created by the client.
//! - [`ServerStatus`] — Online / offline / unknown availability.

/// Error taxonomy and result alias.
pub mod error;
/// Chat message types.
pub mod message;
/// Session and request body types.
pub mod session;
/// Lenient serde helpers for server timestamps.
pub mod timestamp;

pub use error::{ChatError, ChatResult};
pub use message::{ChatMessage, Sender};
pub use session::{
    ChatSession, CreateSessionRequest, SendMessageRequest, ServerStatus, DEFAULT_AGENT_TYPE,
};
