//! Core types for drover.

pub mod completion;
pub mod memory;
pub mod message;
pub mod state;

pub use completion::*;
pub use memory::*;
pub use message::*;
pub use state::*;
