//! Human feedback tool — a signal, not an action.
//!
//! Its sole purpose is to be *named* in a tool call so the decision router
//! recognizes the call as a suspend signal. The router intercepts it
//! before dispatch, so in the normal path the body never runs; the inert
//! implementation exists so the registry stays uniform and the tool's
//! schema and description are advertised to the model.

use async_trait::async_trait;
use wegweiser_core::error::ToolError;
use wegweiser_core::tool::{Tool, ToolResult};

/// The name the decision router matches on.
pub const HUMAN_FEEDBACK_TOOL_NAME: &str = "request_human_feedback";

pub struct HumanFeedbackTool;

#[async_trait]
impl Tool for HumanFeedbackTool {
    fn name(&self) -> &str {
        HUMAN_FEEDBACK_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Ask the user a targeted clarifying question when their profile contains \
         an unresolvable contradiction. The conversation pauses until the user \
         answers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to ask the user"
                }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok("", ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn execution_body_is_inert() {
        let tool = HumanFeedbackTool;
        let result = tool
            .execute(serde_json::json!({"question": "Income priority?"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.is_empty());
    }

    #[test]
    fn tool_definition() {
        let tool = HumanFeedbackTool;
        let def = tool.to_definition();
        assert_eq!(def.name, HUMAN_FEEDBACK_TOOL_NAME);
        assert_eq!(def.parameters["required"], serde_json::json!(["question"]));
    }
}
