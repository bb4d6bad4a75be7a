use crate::config::ResponseConventions;
use crate::dispatch::types::RawResponse;
use crate::error::SessionError;
use crate::identity::wire::is_blank;
use serde_json::Value;

const SNIPPET_CHARS: usize = 200;

/// Fold a raw response into the uniform result shape.
///
/// Non-2xx is a transport error. A 2xx body must parse as JSON; a parsed
/// object carrying a non-empty error field, or a false `ok` field, is an
/// application error. The error field wins when both are present.
pub fn normalize_response(
    response: &RawResponse,
    conventions: &ResponseConventions,
) -> Result<Value, SessionError> {
    if !response.is_success() {
        return Err(status_error(response, conventions));
    }

    let value = parse_body(response)?;
    if let Some(message) = application_error(&value, conventions) {
        return Err(SessionError::Application(message));
    }
    Ok(value)
}

/// Application-level failure message carried by a parsed body, if any.
pub fn application_error(value: &Value, conventions: &ResponseConventions) -> Option<String> {
    let fields = value.as_object()?;

    if let Some(error) = fields.get(&conventions.error_field)
        && !is_blank(error)
    {
        return Some(match error {
            Value::String(message) => message.trim().to_string(),
            _ => conventions.generic_error_message.clone(),
        });
    }

    match fields.get(&conventions.ok_field) {
        Some(ok) if is_false(ok) => Some(conventions.generic_error_message.clone()),
        _ => None,
    }
}

fn parse_body(response: &RawResponse) -> Result<Value, SessionError> {
    let text = response.body.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(SessionError::MalformedResponse(
            "empty response body".to_string(),
        ));
    }

    serde_json::from_str(text).map_err(|e| {
        SessionError::MalformedResponse(format!(
            "{} (content-type: {}): {}",
            e,
            response.content_type.as_deref().unwrap_or("unknown"),
            snippet(text)
        ))
    })
}

fn status_error(response: &RawResponse, conventions: &ResponseConventions) -> SessionError {
    let status = response.status;
    let retryable = status >= 500 || status == 408 || status == 429;

    // Error bodies are often HTML; only quote the server when it sent JSON
    let server_message = serde_json::from_str::<Value>(response.body.trim())
        .ok()
        .and_then(|value| application_error(&value, conventions));

    let message = match server_message {
        Some(detail) => format!("HTTP {}: {}", status, detail),
        None if response.body.trim().is_empty() => format!("HTTP {}", status),
        None => format!("HTTP {}: {}", status, snippet(response.body.trim())),
    };

    SessionError::transport(message, Some(status), retryable)
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false"),
        _ => false,
    }
}

fn snippet(text: &str) -> String {
    let mut out: String = text.chars().take(SNIPPET_CHARS).collect();
    if text.chars().count() > SNIPPET_CHARS {
        out.push('…');
    }
    out
}
