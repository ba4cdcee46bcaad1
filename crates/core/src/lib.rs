//! # Wegweiser Core
//!
//! Domain types, traits, and error definitions for the Wegweiser advisory
//! agent. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two seams of the system — the text-generation collaborator and the
//! tool set — are defined as traits here. Implementations live in their
//! respective crates. This enables:
//! - Substituting stub collaborators in tests
//! - A clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RoutingError, ToolError};
pub use message::{Conversation, ConversationId, Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
