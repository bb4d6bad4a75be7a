use crate::config::{ClientConfig, HeaderConfig, ResponseConventions};
use crate::dispatch::normalize::normalize_response;
use crate::dispatch::transport::{HttpTransport, ReqwestTransport};
use crate::dispatch::types::{Encoding, Method, OutgoingRequest, RequestBody, RequestOptions};
use crate::error::SessionError;
use crate::session::SessionManager;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

/// Single chokepoint for outbound calls.
///
/// Reads the session through the [`SessionManager`] but never modifies it;
/// an authorization failure reported by the server is returned to the caller,
/// which decides whether to log out.
pub struct Dispatcher {
    base: Url,
    headers: HeaderConfig,
    conventions: ResponseConventions,
    default_encoding: Encoding,
    default_timeout: Duration,
    transport: Arc<dyn HttpTransport>,
    session: Arc<SessionManager>,
}

impl Dispatcher {
    pub fn new(
        config: &ClientConfig,
        transport: Arc<dyn HttpTransport>,
        session: Arc<SessionManager>,
    ) -> Result<Self, SessionError> {
        let base = config
            .api
            .base()
            .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            base,
            headers: config.headers.clone(),
            conventions: config.conventions.clone(),
            default_encoding: config.api.default_encoding,
            default_timeout: config.api.request_timeout(),
            transport,
            session,
        })
    }

    /// Dispatcher over a `reqwest` transport built from `config`.
    pub fn from_config(
        config: &ClientConfig,
        session: Arc<SessionManager>,
    ) -> Result<Self, SessionError> {
        let transport = Arc::new(ReqwestTransport::new(&config.api)?);
        Self::new(config, transport, session)
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// POST `params` to `endpoint` with the default encoding and timeout.
    pub async fn request(
        &self,
        endpoint: &str,
        params: &Value,
        requires_auth: bool,
    ) -> Result<Value, SessionError> {
        self.request_with(endpoint, params, RequestOptions::new(requires_auth))
            .await
    }

    /// Like [`Dispatcher::request_with`], decoding the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Value,
        options: RequestOptions,
    ) -> Result<T, SessionError> {
        let value = self.request_with(endpoint, params, options).await?;
        serde_json::from_value(value).map_err(|e| {
            SessionError::MalformedResponse(format!("unexpected payload from {}: {}", endpoint, e))
        })
    }

    pub async fn request_with(
        &self,
        endpoint: &str,
        params: &Value,
        options: RequestOptions,
    ) -> Result<Value, SessionError> {
        let fields = params_object(params)?;
        let mut url = self.endpoint_url(endpoint)?;

        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if options.requires_auth {
            let Some(auth) = self.session.auth_context().await else {
                warn!("Authenticated call to {} without an active session", endpoint);
                return Err(SessionError::SessionInvalid);
            };
            headers.push((
                self.headers.credential.clone(),
                auth.credential.expose().to_string(),
            ));
            headers.push((self.headers.identity.clone(), auth.identity_id.to_string()));
        }

        let body = match options.method {
            Method::Get => {
                if !fields.is_empty() {
                    let mut query = url.query_pairs_mut();
                    for (key, value) in fields {
                        query.append_pair(key, &form_value(value));
                    }
                }
                RequestBody::Empty
            }
            Method::Post => match options.encoding.unwrap_or(self.default_encoding) {
                Encoding::Json => RequestBody::Json(
                    serde_json::to_vec(&Value::Object(fields.clone()))
                        .map_err(|e| SessionError::InvalidRequest(e.to_string()))?,
                ),
                Encoding::Form => RequestBody::Form(form_encode(fields)),
            },
        };

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let request = OutgoingRequest {
            id: Uuid::new_v4(),
            method: options.method,
            url,
            headers,
            body,
            timeout,
        };
        let request_id = request.id;

        debug!(
            "Request {} {:?} {} via {} (auth: {}, {} body bytes)",
            request_id,
            request.method,
            endpoint,
            self.transport.transport_name(),
            options.requires_auth,
            request.body.byte_len()
        );

        let started = Instant::now();
        let raw = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Request {} to {} timed out after {:?}",
                    request_id, endpoint, timeout
                );
                return Err(SessionError::timeout(started.elapsed().as_millis()));
            }
        };

        info!(
            "Request {} to {} completed: HTTP {} in {}ms",
            request_id,
            endpoint,
            raw.status,
            started.elapsed().as_millis()
        );

        normalize_response(&raw, &self.conventions).inspect_err(|e| {
            debug!("Request {} to {} failed: {}", request_id, endpoint, e);
        })
    }

    /// Endpoint resolved below the base URL. Anything that resolves to
    /// another origin or outside the base path is refused, so the credential
    /// is only ever sent to the configured API.
    fn endpoint_url(&self, endpoint: &str) -> Result<Url, SessionError> {
        let relative = endpoint.trim().trim_start_matches('/');
        let refused = || {
            SessionError::InvalidRequest(format!(
                "endpoint must be relative to the base URL: {}",
                endpoint
            ))
        };
        if relative.contains("://") {
            return Err(refused());
        }

        let url = self
            .base
            .join(relative)
            .map_err(|e| SessionError::InvalidRequest(format!("bad endpoint {}: {}", endpoint, e)))?;

        let same_origin = url.scheme() == self.base.scheme()
            && url.host_str() == self.base.host_str()
            && url.port_or_known_default() == self.base.port_or_known_default();
        if !same_origin || !url.path().starts_with(self.base.path()) {
            warn!("Refusing endpoint {} resolving to {}", endpoint, url);
            return Err(refused());
        }
        Ok(url)
    }
}

fn params_object(params: &Value) -> Result<&Map<String, Value>, SessionError> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    match params {
        Value::Object(fields) => Ok(fields),
        Value::Null => Ok(EMPTY.get_or_init(Map::new)),
        other => Err(SessionError::InvalidRequest(format!(
            "params must be a JSON object, got {}",
            other
        ))),
    }
}

/// Form/query rendering of one value: scalars as text, `null` as empty,
/// arrays and objects as their JSON text.
pub fn form_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn form_encode(fields: &Map<String, Value>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, &form_value(value));
    }
    serializer.finish()
}
