pub mod command;
pub mod correlation;
pub mod message;

pub use command::*;
pub use correlation::*;
pub use message::*;
