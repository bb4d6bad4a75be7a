use crate::config::ApiConfig;
use crate::dispatch::types::{Method, OutgoingRequest, RawResponse, RequestBody};
use crate::error::SessionError;
use futures::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

/// Sends fully built requests over the network.
///
/// Implementations report connection-level failures as
/// [`SessionError::Transport`] and return every HTTP response, whatever its
/// status, as a [`RawResponse`].
pub trait HttpTransport: Send + Sync {
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<RawResponse, SessionError>>;

    /// Transport name for logs
    fn transport_name(&self) -> &'static str;
}

/// `reqwest`-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(api: &ApiConfig) -> Result<Self, SessionError> {
        let client = reqwest::Client::builder()
            .user_agent(api.user_agent.clone())
            .connect_timeout(api.connect_timeout())
            .build()
            .map_err(|e| {
                SessionError::transport(format!("failed to build HTTP client: {}", e), None, false)
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn map_error(error: reqwest::Error) -> SessionError {
        if error.is_builder() {
            return SessionError::InvalidRequest(error.to_string());
        }
        let retryable = error.is_timeout() || error.is_connect() || error.is_request();
        SessionError::transport(
            error.to_string(),
            error.status().map(|s| s.as_u16()),
            retryable,
        )
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: OutgoingRequest) -> BoxFuture<'_, Result<RawResponse, SessionError>> {
        Box::pin(async move {
            let mut builder = match request.method {
                Method::Post => self.client.post(request.url.clone()),
                Method::Get => self.client.get(request.url.clone()),
            };

            builder = builder.timeout(request.timeout);

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            if let Some(content_type) = request.body.content_type() {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Json(bytes) => builder.body(bytes),
                RequestBody::Form(text) => builder.body(text),
            };

            let response = builder.send().await.map_err(Self::map_error)?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.map_err(Self::map_error)?;

            debug!(
                "Request {} answered with HTTP {} ({} bytes)",
                request.id,
                status,
                body.len()
            );
            Ok(RawResponse {
                status,
                content_type,
                body,
            })
        })
    }

    fn transport_name(&self) -> &'static str {
        "reqwest"
    }
}
