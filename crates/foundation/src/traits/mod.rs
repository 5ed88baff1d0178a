pub mod collaborators;
pub mod transport;

pub use collaborators::*;
pub use transport::*;
