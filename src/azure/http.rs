//! HTTP utilities for Azure REST API calls

use crate::error::ProviderError;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header used by ARM to correlate a request with service-side logs
const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// A decoded JSON body together with the response headers
#[derive(Debug)]
pub struct JsonResponse {
    pub body: Value,
    pub headers: HeaderMap,
}

/// HTTP client wrapper for Azure API calls
#[derive(Clone)]
pub struct AzureHttpClient {
    client: Client,
}

impl AzureHttpClient {
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("azgraph/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request to an Azure API
    pub async fn get(&self, url: &str, token: &str) -> Result<JsonResponse, ProviderError> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url), token).await
    }

    /// Make a POST request with a JSON body to an Azure API
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        token: &str,
        body: &B,
    ) -> Result<JsonResponse, ProviderError> {
        tracing::debug!("POST {}", url);
        self.send(self.client.post(url).json(body), token).await
    }

    async fn send(
        &self,
        request: RequestBuilder,
        token: &str,
    ) -> Result<JsonResponse, ProviderError> {
        let request_id = Uuid::new_v4().to_string();
        let response = request
            .bearer_auth(token)
            .header(CLIENT_REQUEST_ID_HEADER, &request_id)
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error: {} - {} (request id {})",
                status,
                sanitize_for_log(&body),
                request_id
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };

        Ok(JsonResponse { body, headers })
    }
}

/// Format an Azure API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_azure_error(error: &ProviderError) -> String {
    match error.status() {
        Some(400) => return "Invalid request. Check the query and resource type.".to_string(),
        Some(401) => {
            return "Authentication failed. Check the tenant, client id and secret.".to_string()
        }
        Some(403) => {
            return "Permission denied. The principal needs Reader access on the subscriptions."
                .to_string()
        }
        Some(404) => return "Resource not found.".to_string(),
        Some(429) => return "Rate limit exceeded. Please try again later.".to_string(),
        Some(500) | Some(502) | Some(503) => {
            return "Azure service temporarily unavailable. Please try again.".to_string()
        }
        _ => {}
    }

    if let ProviderError::Auth { message } = error {
        return format!("Authentication failed: {}", truncate(message, 120));
    }

    truncate(&error.to_string(), 80)
}

fn truncate(message: &str, max: usize) -> String {
    let sanitized: String = message
        .chars()
        .take(max)
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();

    if message.chars().count() > max {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}
