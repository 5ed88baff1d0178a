//! # Aurora Foundation
//!
//! Core abstractions shared by the Aurora dispatch engine and its adapters:
//!
//! - **Wire codec**: JSON encoding of commands and decoding of replies
//! - **Models**: the command body sent to access points, correlation ids and
//!   the wire-level message envelope
//! - **Transport seam**: `BrokerTransport` / `BrokerSession` / `BrokerChannel`,
//!   implemented over AMQP in `aurora-infrastructure` and by in-memory mocks in
//!   `aurora-testing-utils`
//! - **Collaborators**: the callbacks the engine consumes (timeouts, replies,
//!   the known-destination directory and the reply-queue registry)

pub mod codec;
pub mod models;
pub mod traits;

pub use aurora_errors::{DispatchError, DispatchResult};
pub use codec::WireCodec;
pub use models::*;
pub use traits::*;
