//! Web search tool backed by the Tavily search API.
//!
//! Returns a summarized answer plus a short source list. Result count is
//! capped at 3 to control prompt growth.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use wegweiser_core::error::ToolError;
use wegweiser_core::tool::{Tool, ToolResult};

const MAX_RESULTS: usize = 3;
const TAVILY_API_URL: &str = "https://api.tavily.com";

pub struct WebSearchTool {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: TAVILY_API_URL.into(),
            client: crate::tool_client(),
        }
    }

    /// Point the tool at a different endpoint. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn search(&self, query: &str) -> Result<String, String> {
        let url = format!("{}/search", self.base_url);
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": MAX_RESULTS,
            "include_answer": true,
        });

        debug!(query, "Running web search");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Search request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!(
                "Search provider returned status {}",
                response.status().as_u16()
            ));
        }

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse search response: {e}"))?;

        let mut output = String::new();
        if let Some(answer) = parsed.answer.filter(|a| !a.is_empty()) {
            output.push_str(&answer);
            output.push_str("\n\n");
        }

        if parsed.results.is_empty() && output.is_empty() {
            return Ok("No search results found.".into());
        }

        if !parsed.results.is_empty() {
            output.push_str("Sources:\n");
            for result in parsed.results.iter().take(MAX_RESULTS) {
                output.push_str(&format!("- {} ({})\n  {}\n", result.title, result.url, result.content));
            }
        }

        Ok(output.trim_end().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "A powerful search engine. Use this to find information on the internet. \
         It returns a summarized answer and a list of sources."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        match self.search(query).await {
            Ok(output) => Ok(ToolResult::ok("", output)),
            Err(reason) => Ok(ToolResult::failure(
                "",
                format!("An error occurred during web search: {reason}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn search_formats_answer_and_sources() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "answer": "Biomedical engineering combines medicine and technology.",
                "results": [
                    {
                        "title": "BME at TU Munich",
                        "url": "https://tum.de/bme",
                        "content": "Program overview and admission requirements."
                    }
                ]
            })))
            .mount(&server)
            .await;

        let tool = WebSearchTool::new("tvly-test").with_base_url(server.uri());
        let result = tool
            .execute(serde_json::json!({"query": "biomedical engineering"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("combines medicine and technology"));
        assert!(result.output.contains("https://tum.de/bme"));
    }

    #[tokio::test]
    async fn provider_error_becomes_text_not_exception() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = WebSearchTool::new("tvly-test").with_base_url(server.uri());
        let result = tool
            .execute(serde_json::json!({"query": "anything"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("An error occurred"));
        assert!(result.output.contains("500"));
    }

    #[tokio::test]
    async fn empty_results_produce_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"answer": null, "results": []})),
            )
            .mount(&server)
            .await;

        let tool = WebSearchTool::new("tvly-test").with_base_url(server.uri());
        let result = tool
            .execute(serde_json::json!({"query": "nothing"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, "No search results found.");
    }

    #[tokio::test]
    async fn missing_query_returns_invalid_arguments() {
        let tool = WebSearchTool::new("tvly-test");
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn tool_definition() {
        let tool = WebSearchTool::new("tvly-test");
        let def = tool.to_definition();
        assert_eq!(def.name, "web_search");
        assert!(!def.description.is_empty());
        assert_eq!(def.parameters["required"], serde_json::json!(["query"]));
    }
}
