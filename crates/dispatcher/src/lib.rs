//! Aurora dispatch engine
//!
//! Owns the broker connection, keeps it alive through a background health
//! monitor, serializes outgoing commands and tracks a deadline per request
//! until the access point acknowledges it.

pub mod connection;
pub mod engine;
pub mod health_monitor;
pub mod response;
pub mod timeout;
pub mod tracker;

pub use connection::{
    CloseGuard, CloseReason, ConnectionManager, ConnectionSettings, ConnectionState, LiveSession,
    OpenKind,
};
pub use engine::{DispatchOutcome, Dispatcher, DispatcherCollaborators};
pub use health_monitor::HealthMonitor;
pub use response::ResolvingResponseHandler;
pub use timeout::LoggingTimeoutHandler;
pub use tracker::{RequestTracker, TimerHandle, TrackedRequest};
