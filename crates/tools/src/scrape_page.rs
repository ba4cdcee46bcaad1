//! Page scraping tool — fetches a URL and extracts readable text.
//!
//! Uses readability extraction to strip boilerplate, collapses whitespace,
//! and truncates to a fixed cap to bound downstream token cost.

use async_trait::async_trait;
use std::io::Cursor;
use tracing::debug;
use url::Url;
use wegweiser_core::error::ToolError;
use wegweiser_core::tool::{Tool, ToolResult};

/// Maximum number of characters forwarded to the model.
const MAX_CONTENT_CHARS: usize = 5000;

const EMPTY_PAGE_SENTINEL: &str = "Could not find any text content on the page.";

pub struct ScrapePageTool {
    client: reqwest::Client,
}

impl ScrapePageTool {
    pub fn new() -> Self {
        Self {
            client: crate::tool_client(),
        }
    }

    async fn scrape(&self, url: &str) -> Result<String, String> {
        let parsed_url = Url::parse(url).map_err(|e| format!("Invalid URL: {e}"))?;

        debug!(%url, "Scraping page");

        let html = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Failed to fetch page: {e}"))?
            .error_for_status()
            .map_err(|e| format!("Page returned an error status: {e}"))?
            .text()
            .await
            .map_err(|e| format!("Failed to read page body: {e}"))?;

        let mut cursor = Cursor::new(html);
        let extracted = readability::extractor::extract(&mut cursor, &parsed_url)
            .map_err(|e| format!("Failed to extract content: {e}"))?;

        let cleaned: String = extracted
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if cleaned.is_empty() {
            return Ok(EMPTY_PAGE_SENTINEL.into());
        }

        // Cut on a char boundary, not a byte offset.
        Ok(cleaned.chars().take(MAX_CONTENT_CHARS).collect())
    }
}

impl Default for ScrapePageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ScrapePageTool {
    fn name(&self) -> &str {
        "scrape_page"
    }

    fn description(&self) -> &str {
        "Scrapes the text content of a single webpage. Use this when you have a \
         specific URL and need to read its content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the webpage you want to scrape"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        match self.scrape(url).await {
            Ok(content) => Ok(ToolResult::ok("", content)),
            Err(reason) => Ok(ToolResult::failure(
                "",
                format!("An error occurred while trying to scrape the website: {reason}"),
            )),
        }
    }
}
