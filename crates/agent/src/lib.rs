//! The Wegweiser control loop — the heart of the advisory agent.
//!
//! One **cycle** runs: model step → route → tool step, suspension, or
//! termination:
//!
//! 1. Send the full conversation (system prompt first) to the provider
//! 2. Append the assistant message it returns
//! 3. Route on that message: tool calls → dispatch them all and loop;
//!    first call named `request_human_feedback` → suspend and hand
//!    control back to the caller; no tool calls → terminate
//!
//! Suspension persists nothing but the conversation itself — resuming is
//! "append the resolving tool result and call the loop again".

pub mod classifier;
pub mod loop_runner;
pub mod prompt;
pub mod router;

pub use classifier::{Classified, Recommendation, RecommendationSet, classify};
pub use loop_runner::{AgentLoop, LoopOutcome};
pub use prompt::system_prompt;
pub use router::{NextAction, route};
