//! Adapters binding the dispatch engine to its runtime environment: the
//! RabbitMQ transport, the file-backed reply-queue registry and the
//! configured destination directory.

pub mod amqp;
pub mod directory;
pub mod reply_queue_registry;

pub use amqp::*;
pub use directory::*;
pub use reply_queue_registry::*;
