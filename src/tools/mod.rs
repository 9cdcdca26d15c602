//! Tool contract: capability trait, results, builtins.

pub mod builtin;
pub mod result;
pub mod tool;

pub use builtin::{Terminate, TERMINATE_NAME};
pub use result::ToolResult;
pub use tool::{FnTool, Tool};
