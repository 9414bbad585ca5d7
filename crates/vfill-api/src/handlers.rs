//! Request handlers.

pub mod health;
pub mod stats;
pub mod upload;

pub use health::*;
pub use stats::*;
pub use upload::*;
