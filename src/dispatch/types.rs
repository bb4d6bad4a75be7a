use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    #[default]
    Post,
    /// Read-only listings; params travel in the query string
    Get,
}

/// Body encoding of a POST
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Form,
}

/// Per-call dispatch options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub requires_auth: bool,
    pub method: Method,
    /// `None` uses the configured default
    pub encoding: Option<Encoding>,
    /// `None` uses the configured default
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(requires_auth: bool) -> Self {
        Self {
            requires_auth,
            ..Default::default()
        }
    }

    pub fn authenticated() -> Self {
        Self::new(true)
    }

    pub fn public() -> Self {
        Self::new(false)
    }

    pub fn get(mut self) -> Self {
        self.method = Method::Get;
        self
    }

    pub fn form(mut self) -> Self {
        self.encoding = Some(Encoding::Form);
        self
    }

    pub fn json(mut self) -> Self {
        self.encoding = Some(Encoding::Json);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Vec<u8>),
    Form(String),
}

impl RequestBody {
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Json(_) => Some(JSON_CONTENT_TYPE),
            RequestBody::Form(_) => Some(FORM_CONTENT_TYPE),
        }
    }

    /// Body size for logs
    pub(crate) fn byte_len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Json(bytes) => bytes.len(),
            RequestBody::Form(text) => text.len(),
        }
    }
}

/// Fully built request handed to a transport
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub id: Uuid,
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    /// Deadline for the whole exchange, connect included
    pub timeout: Duration,
}

impl OutgoingRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Undecoded response as received from the transport
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
