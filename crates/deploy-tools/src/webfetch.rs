//! WebFetch tool - fetch documentation or other content from a URL.

use crate::{parse_args, truncate_str, Tool, ToolContext, ToolError, ToolOutput, ToolResult};
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Request timeout.
const TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of response bytes handed back to the model.
pub const MAX_BYTES: usize = 5000;

/// Fetch a URL and return the start of its body.
pub struct WebFetchTool;

#[derive(Debug, Deserialize)]
struct WebFetchArgs {
    url: String,
}

#[async_trait]
impl Tool for WebFetchTool {
    fn id(&self) -> &str {
        "webfetch"
    }

    fn description(&self) -> &str {
        "Fetch content from a URL (documentation, API specs, etc.)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch content from"
                }
            }
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> ToolResult<ToolOutput> {
        let args: WebFetchArgs = parse_args(args)?;

        let url = Url::parse(&args.url)
            .map_err(|e| ToolError::validation(format!("Invalid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ToolError::validation(format!(
                "Only http and https URLs are supported, got: {}",
                url.scheme()
            )));
        }

        debug!(url = %url, "Fetching URL");

        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("deploy/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ToolError::execution_failed(format!("Failed to create HTTP client: {e}")))?;

        let request = async {
            let response = client.get(url.clone()).send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = tokio::select! {
            _ = ctx.abort.cancelled() => return Err(ToolError::Cancelled),
            result = request => result.map_err(|e| {
                if e.is_timeout() {
                    ToolError::Timeout(TIMEOUT)
                } else {
                    ToolError::execution_failed(format!("Request failed: {e}"))
                }
            })?,
        };

        if !status.is_success() {
            return Err(ToolError::execution_failed(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let content = truncate_str(&body, MAX_BYTES);
        let output = if content.is_empty() {
            "Success (No content returned).".to_string()
        } else {
            content.to_string()
        };

        Ok(
            ToolOutput::new(format!("Fetched {url}"), output).with_metadata(json!({
                "url": url.as_str(),
                "status": status.as_u16(),
                "bytes": body.len(),
                "truncated": body.len() > MAX_BYTES
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fetch(url: String) -> ToolResult<ToolOutput> {
        let ctx = ToolContext::new("/tmp");
        WebFetchTool.execute(json!({ "url": url }), &ctx).await
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_string("API reference"))
            .mount(&server)
            .await;

        let result = fetch(format!("{}/docs", server.uri())).await.unwrap();
        assert_eq!(result.output, "API reference");
        assert_eq!(result.metadata["status"], 200);
        assert_eq!(result.metadata["truncated"], false);
    }

    #[tokio::test]
    async fn test_fetch_truncates_large_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(MAX_BYTES * 2)))
            .mount(&server)
            .await;

        let result = fetch(server.uri()).await.unwrap();
        assert_eq!(result.output.len(), MAX_BYTES);
        assert_eq!(result.metadata["truncated"], true);
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let result = fetch(server.uri()).await.unwrap();
        assert_eq!(result.output, "Success (No content returned).");
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = fetch(server.uri()).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 Not Found");
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let err = fetch("file:///etc/passwd".to_string()).await.unwrap_err();
        assert!(err.is_validation());

        let err = fetch("not a url".to_string()).await.unwrap_err();
        assert!(err.is_validation());
    }
}
