use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, instrument};

use super::TransportError;

/// Blocking JSON-over-HTTP client bound to one base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `http://localhost:8080`).
    pub fn new(base_url: impl Into<String>) -> Result<HttpTransport, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(HttpTransport { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST <base><endpoint>` with a JSON body, and parse the JSON answer.
    #[instrument(skip(self, body), fields(url = %self.base_url))]
    pub fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let request = self.client.post(self.url(endpoint)).json(body);
        self.send(request, timeout)
    }

    /// `POST <base><endpoint>` with a plain-text body (engine commands), and parse the JSON
    /// answer.
    #[instrument(skip(self), fields(url = %self.base_url))]
    pub fn post_text(
        &self,
        endpoint: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        let request = self
            .client
            .post(self.url(endpoint))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body.to_owned());
        self.send(request, timeout)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    fn send(&self, request: RequestBuilder, timeout: Duration) -> Result<Value, TransportError> {
        let response = request
            .timeout(timeout)
            .send()
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let text = response.text().map_err(|e| classify(e, timeout))?;
        debug!(bytes = text.len(), "response received");
        Ok(serde_json::from_str(&text)?)
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_decode() || error.is_body() {
        TransportError::Parse(error.to_string())
    } else {
        TransportError::Connect(error.to_string())
    }
}
