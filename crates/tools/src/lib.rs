//! Built-in tool implementations for Wegweiser.
//!
//! Tools give the agent the ability to research candidate recommendations:
//! search the web, scrape a page's text, enumerate its links, and flag a
//! clarifying question back to the human.
//!
//! Execution contract: argument-shape violations surface as
//! `ToolError::InvalidArguments`; everything that can fail at runtime
//! (network, parse, timeout) is caught inside `execute` and returned as
//! descriptive text, so callers can treat tool output as always-a-string.

pub mod find_links;
pub mod human_feedback;
pub mod scrape_page;
pub mod web_search;

use wegweiser_core::tool::ToolRegistry;

pub use human_feedback::HUMAN_FEEDBACK_TOOL_NAME;

/// Per-request timeout applied by every network-bound tool.
pub(crate) const TOOL_TIMEOUT_SECS: u64 = 10;

/// Create the default tool registry.
///
/// `tavily_api_key` powers web_search; the other tools need no credentials.
pub fn default_registry(tavily_api_key: impl Into<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(web_search::WebSearchTool::new(tavily_api_key)));
    registry.register(Box::new(scrape_page::ScrapePageTool::new()));
    registry.register(Box::new(find_links::FindLinksTool::new()));
    registry.register(Box::new(human_feedback::HumanFeedbackTool));
    registry
}

/// Shared HTTP client builder for network tools.
pub(crate) fn tool_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(TOOL_TIMEOUT_SECS))
        .user_agent("Mozilla/5.0 (compatible; wegweiser-agent)")
        .build()
        .unwrap_or_default()
}
