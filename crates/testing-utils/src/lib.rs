//! # Aurora Testing Utils
//!
//! Shared testing utilities for the Aurora dispatch engine.
//!
//! ## Features
//!
//! - **Mock Broker**: an in-memory `BrokerTransport` that records publishes,
//!   detects overlapping publishes and can simulate connection and channel loss
//! - **Recording Collaborators**: timeout and response handlers that remember
//!   every call, an in-memory reply-queue registry and a fixed destination
//!   directory
//! - **Broker Test Container**: a RabbitMQ container for transport tests
//! - **Builders**: configuration with short test intervals
//!
//! ## Usage
//!
//! ```toml
//! [dev-dependencies]
//! aurora-testing-utils = { path = "../testing-utils" }
//! ```
//!
//! ```ignore
//! use aurora_testing_utils::mocks::*;
//! use aurora_testing_utils::builders::TestConfigBuilder;
//! ```

pub mod builders;
pub mod containers;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use containers::*;
pub use helpers::*;
pub use mocks::*;
