use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;

use crate::error::UpstreamError;
use crate::models::{check_payload, Method, UpstreamRequest, UpstreamResponse};

/// Performs one outbound request. Implemented by [`UpstreamClient`] and by
/// test doubles.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> crate::Result<UpstreamResponse>;
}

/// HTTP client for third-party upstreams.
///
/// Each request carries its own timeout. The timeout covers the whole
/// exchange including the body, and dropping the in-flight future on expiry
/// closes the connection.
pub struct UpstreamClient {
    client: Client,
    user_agent: String,
}

impl UpstreamClient {
    /// Create a new UpstreamClient with a static reqwest Client
    pub fn with_client(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }

    pub fn new(user_agent: impl Into<String>) -> crate::Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| UpstreamError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(client, user_agent))
    }
}

#[async_trait]
impl Fetcher for UpstreamClient {
    async fn fetch(&self, request: UpstreamRequest) -> crate::Result<UpstreamResponse> {
        tracing::debug!("Fetching upstream: {}", request.redacted_url());

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        // A request-level User-Agent replaces the configured one.
        if !request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(USER_AGENT.as_str()))
        {
            builder = builder.header(USER_AGENT, &self.user_agent);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, request.timeout))?;
        let status = response.status();

        if !status.is_success() {
            tracing::debug!("Upstream {} answered {}", request.redacted_url(), status);
            return Err(UpstreamError::Rejected {
                status_code: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest(e, request.timeout))?;

        check_payload(request.expect, &body)?;

        tracing::debug!(
            "Fetched {} bytes from {}",
            body.len(),
            request.redacted_url()
        );
        Ok(UpstreamResponse { body, content_type })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Answer one request on a loopback port and hand back its header
    /// lines, lowercased.
    async fn capture_headers(request: impl FnOnce(String) -> UpstreamRequest) -> Vec<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/feed", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
                .await
                .unwrap();
            String::from_utf8_lossy(&raw)
                .lines()
                .skip(1)
                .map(|line| line.to_lowercase())
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
        });

        let client = UpstreamClient::with_client(
            Client::builder().no_proxy().build().unwrap(),
            "configured-agent/2.0",
        );
        let response = client.fetch(request(url)).await.unwrap();
        assert_eq!(response.body, "{}");
        server.await.unwrap()
    }

    fn user_agents(headers: &[String]) -> Vec<&String> {
        headers.iter().filter(|h| h.starts_with("user-agent:")).collect()
    }

    #[tokio::test]
    async fn test_configured_user_agent_is_sent_once() {
        let headers = capture_headers(|url| {
            UpstreamRequest::get(url)
                .header("Accept", "application/json")
                .timeout(Duration::from_secs(5))
        })
        .await;

        assert_eq!(user_agents(&headers), vec!["user-agent: configured-agent/2.0"]);
        assert!(headers.contains(&"accept: application/json".to_string()));
    }

    #[tokio::test]
    async fn test_request_user_agent_replaces_configured_one() {
        let headers = capture_headers(|url| {
            UpstreamRequest::get(url)
                .header("user-agent", "special/1.0")
                .timeout(Duration::from_secs(5))
        })
        .await;

        assert_eq!(user_agents(&headers), vec!["user-agent: special/1.0"]);
    }
}
