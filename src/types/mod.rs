//! Type definitions

pub mod duty;
pub mod messages;
pub mod place;
pub mod trip;

pub use duty::*;
pub use messages::*;
pub use place::*;
pub use trip::*;
