//! Decision router — classifies the next control action.
//!
//! A pure function over the most recent assistant message. All branching
//! in the control loop funnels through here, which is what makes the loop
//! itself a small state machine.

use wegweiser_core::message::Message;
use wegweiser_tools::HUMAN_FEEDBACK_TOOL_NAME;

/// The next control action for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Dispatch every tool call in the triggering message, then run
    /// another model step.
    InvokeTools,
    /// Hand control back to the caller pending a human answer.
    SuspendForHuman,
    /// Return control to the caller with the assistant's text.
    Terminate,
}

/// Route on the latest assistant message.
///
/// The first tool call's name decides suspension; otherwise any tool
/// calls mean dispatch. A message with no tool calls terminates the
/// cycle even when its text is empty — malformed upstream output is the
/// caller's problem to render, never a reason to loop forever.
pub fn route(last: &Message) -> NextAction {
    match last.tool_calls.first() {
        Some(first) if first.name == HUMAN_FEEDBACK_TOOL_NAME => NextAction::SuspendForHuman,
        Some(_) => NextAction::InvokeTools,
        None => NextAction::Terminate,
    }
}
