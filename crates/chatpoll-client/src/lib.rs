//! Session-polling engine for the agent chat service.
//!
//! Simulates a live message stream over plain HTTP request/response: each
//! streaming session polls for messages newer than its cursor, backs off
//! exponentially on failure, switches to a faster cadence while a
//! conversation is active, and pauses while the consuming UI is hidden.
//!
//! # Main types
//!
//! - [`ChatClient`] — Session lifecycle manager and streaming entry point.
//! - [`StreamHandlers`] — Message and error callbacks for one stream.
//! - [`BackoffPolicy`] — Poll delay computation.
//! - [`VisibilityGate`] — Shared foreground flag gating poll ticks.
//! - [`ChatTransport`] / [`HttpTransport`] — Access to the remote service.
//! - [`HealthProbe`] — Lower-level server health check.

/// Lifecycle manager.
pub mod client;
/// Connection and polling configuration.
pub mod config;
mod cycle;
/// Server health probes.
pub mod health;
/// Per-session stream bookkeeping.
pub mod registry;
/// Poll interval computation.
pub mod scheduler;
/// Cancellable background timers.
pub mod timer;
/// Remote service access.
pub mod transport;
/// Foreground/background gating.
pub mod visibility;

pub use chatpoll_core::{
    ChatError, ChatMessage, ChatResult, ChatSession, SendMessageRequest, Sender, ServerStatus,
};
pub use client::{ChatClient, ChatClientBuilder, StreamEvent};
pub use config::{ClientConfig, PollingConfig};
pub use health::{HealthProbe, HttpHealthProbe, StaticHealth};
pub use registry::{PollState, PollStats, SessionRegistry, StreamHandlers};
pub use scheduler::BackoffPolicy;
pub use timer::TimerHandle;
pub use transport::{ChatTransport, HttpTransport};
pub use visibility::{Visibility, VisibilityGate};
