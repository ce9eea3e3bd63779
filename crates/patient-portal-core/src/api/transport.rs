//! HTTP transport seam.
//!
//! The API client speaks to the backend only through [`Transport`]. The
//! production implementation is [`HttpTransport`]; tests plug in the stub
//! backend or [`crate::stub::Unreachable`].

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Transport-level failures (no HTTP status was received).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("could not reach the server: {0}")]
    Unreachable(String),

    #[error("request timed out")]
    Timeout,

    #[error("could not build HTTP client: {0}")]
    Setup(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Response with a JSON body.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn parse<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }

    /// Human-readable error carried in the body, if any.
    ///
    /// Looks at `error` (plus validation `details`) and then `msg`.
    pub fn error_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.body).ok()?;

        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            let details = value
                .get("details")
                .and_then(|d| d.as_object())
                .map(|fields| {
                    let mut parts: Vec<String> = fields
                        .iter()
                        .map(|(field, msg)| match msg.as_str() {
                            Some(text) => format!("{field}: {text}"),
                            None => format!("{field}: {msg}"),
                        })
                        .collect();
                    parts.sort();
                    parts.join("; ")
                })
                .filter(|d| !d.is_empty());

            return Some(match details {
                Some(details) => format!("{error}: {details}"),
                None => error.to_string(),
            });
        }

        value
            .get("msg")
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }
}

/// Sends one request and returns the response.
pub trait Transport {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        (**self).send(request)
    }
}

/// Blocking HTTP transport backed by reqwest.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Unreachable(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;

        Ok(HttpResponse { status, body })
    }
}
