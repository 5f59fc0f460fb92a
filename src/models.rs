//! The canonical, provider-agnostic conversation model.
//!
//! Every vendor disagrees on role taxonomy, content encoding, and tool
//! schemas; these types are the one shape the rest of the crate operates on.
//! Adapters translate to and from vendor wire formats, never the other way
//! around.

pub mod content;
pub mod message;
pub mod thread;
pub mod tool;

pub use content::{Content, Part};
pub use message::{Message, Role};
pub use thread::{GenerationConfig, Thread, Turn};
pub use tool::ToolDeclaration;
