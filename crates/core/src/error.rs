//! Error types for the Wegweiser domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own error enum; the taxonomy separates fatal cycle errors
//! (provider, routing) from recoverable ones (tool execution, which is
//! absorbed into the conversation as text).

use thiserror::Error;

/// The top-level error type for all Wegweiser operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The text-generation collaborator failed. Fatal for the cycle — the
    /// loop never retries a stateful multi-turn conversation.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model requested something the tool registry cannot satisfy.
    /// A contract violation, surfaced distinctly from tool failures —
    /// which never reach this type, being absorbed into the conversation
    /// as tool_result text.
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Contract violations between the model and the tool registry.
#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Unknown tool requested by model: {0}")]
    UnknownTool(String),

    #[error("Malformed tool call {call_id}: {reason}")]
    MalformedCall { call_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
