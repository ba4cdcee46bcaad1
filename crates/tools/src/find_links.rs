//! Link enumeration tool — lists the navigable links on a page.
//!
//! Relative hrefs are resolved against the page URL, only http/https
//! survive, fragment-carrying URLs are dropped, duplicates are collapsed
//! keeping first occurrence, and the list is capped so the model is not
//! overwhelmed.

use async_trait::async_trait;
use tracing::debug;
use url::Url;
use wegweiser_core::error::ToolError;
use wegweiser_core::tool::{Tool, ToolResult};

/// Maximum number of links forwarded to the model.
const MAX_LINKS: usize = 30;

const NO_LINKS_SENTINEL: &str = "No links found on this page.";

pub struct FindLinksTool {
    client: reqwest::Client,
}

impl FindLinksTool {
    pub fn new() -> Self {
        Self {
            client: crate::tool_client(),
        }
    }

    async fn find(&self, url: &str) -> Result<String, String> {
        let base = Url::parse(url).map_err(|e| format!("Invalid URL: {e}"))?;

        debug!(%url, "Finding links");

        let html = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Error fetching the URL: {e}"))?
            .error_for_status()
            .map_err(|e| format!("Page returned an error status: {e}"))?
            .text()
            .await
            .map_err(|e| format!("Failed to read page body: {e}"))?;

        let links = extract_links(&base, &html);

        if links.is_empty() {
            return Ok(NO_LINKS_SENTINEL.into());
        }

        let listing = links
            .iter()
            .take(MAX_LINKS)
            .map(|link| format!("- {link}"))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!("Found the following links:\n{listing}"))
    }
}

impl Default for FindLinksTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull href targets out of anchor tags and normalize them.
///
/// A full DOM parse is overkill for link listing; scanning for href
/// attributes handles real-world pages well enough for the agent's
/// exploration purposes.
fn extract_links(base: &Url, html: &str) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    let bytes = html.as_bytes();
    let mut i = 0;

    while i + 5 <= bytes.len() {
        if !bytes[i..i + 5].eq_ignore_ascii_case(b"href=") {
            i += 1;
            continue;
        }
        let attr_start = i + 5;
        i = attr_start;

        // attr_start sits right after the ASCII '=', always a char boundary.
        let rest = &html[attr_start..];
        let mut chars = rest.chars();
        let Some(quote) = chars.next() else { break };
        if quote != '"' && quote != '\'' {
            continue;
        }

        let Some(end) = rest[1..].find(quote) else {
            continue;
        };
        let href = &rest[1..1 + end];
        if href.is_empty() {
            continue;
        }

        let Ok(absolute) = base.join(href) else {
            continue;
        };

        if !matches!(absolute.scheme(), "http" | "https") {
            continue;
        }

        // Fragment links point back into the same document.
        if absolute.fragment().is_some() {
            continue;
        }

        let absolute = absolute.to_string();
        if !links.contains(&absolute) {
            links.push(absolute);
        }
    }

    links
}

#[async_trait]
impl Tool for FindLinksTool {
    fn name(&self) -> &str {
        "find_links"
    }

    fn description(&self) -> &str {
        "Finds all the navigable links on a given webpage URL and returns them as \
         a list. Use this to explore a website and decide where to go next."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the webpage to find links on"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let url = arguments["url"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'url' argument".into()))?;

        match self.find(url).await {
            Ok(output) => Ok(ToolResult::ok("", output)),
            Err(reason) => Ok(ToolResult::failure(
                "",
                format!("An error occurred while finding links: {reason}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn filters_fragments_schemes_and_duplicates() {
        let base = Url::parse("https://a.com/").unwrap();
        let html = r##"
            <a href="https://a.com/x">one</a>
            <a href="https://a.com/x#frag">fragment dup</a>
            <a href="mailto:foo@bar.com">mail</a>
        "##;

        let links = extract_links(&base, html);
        assert_eq!(links, vec!["https://a.com/x"]);
    }

    #[test]
    fn resolves_relative_links() {
        let base = Url::parse("https://a.com/dir/page.html").unwrap();
        let html = r#"<a href="../other.html">up</a> <a href='/root.html'>root</a>"#;

        let links = extract_links(&base, html);
        assert_eq!(
            links,
            vec!["https://a.com/other.html", "https://a.com/root.html"]
        );
    }

    #[test]
    fn preserves_first_occurrence_order() {
        let base = Url::parse("https://a.com/").unwrap();
        let html = r#"
            <a href="https://a.com/b">b</a>
            <a href="https://a.com/a">a</a>
            <a href="https://a.com/b">b again</a>
        "#;

        let links = extract_links(&base, html);
        assert_eq!(links, vec!["https://a.com/b", "https://a.com/a"]);
    }

    #[tokio::test]
    async fn page_without_links_produces_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("<html><body>plain</body></html>"),
            )
            .mount(&server)
            .await;

        let tool = FindLinksTool::new();
        let result = tool
            .execute(serde_json::json!({"url": server.uri()}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output, NO_LINKS_SENTINEL);
    }

    #[tokio::test]
    async fn listing_is_capped() {
        let server = MockServer::start().await;
        let anchors: String = (0..50)
            .map(|i| format!(r#"<a href="https://a.com/page{i}">p{i}</a>"#))
            .collect();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(anchors))
            .mount(&server)
            .await;

        let tool = FindLinksTool::new();
        let result = tool
            .execute(serde_json::json!({"url": server.uri()}))
            .await
            .unwrap();

        assert!(result.success);
        let count = result.output.lines().filter(|l| l.starts_with("- ")).count();
        assert_eq!(count, MAX_LINKS);
    }

    #[tokio::test]
    async fn fetch_failure_becomes_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tool = FindLinksTool::new();
        let result = tool
            .execute(serde_json::json!({"url": server.uri()}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.output.contains("An error occurred while finding links"));
    }

    #[tokio::test]
    async fn missing_url_returns_invalid_arguments() {
        let tool = FindLinksTool::new();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
