pub mod app_config;
pub mod broker;
pub mod directory;
pub mod dispatcher;

pub use app_config::*;
pub use broker::*;
pub use directory::*;
pub use dispatcher::*;
