use crate::config::ResponseConventions;
use crate::error::SessionError;
use crate::identity::types::{Credential, Identity};
use crate::identity::wire;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Build the identity carried by a successful login response.
///
/// The identity sub-object must be present and decodable, and a credential
/// must be found either inside it or at the top level of the body. Anything
/// else is a backend defect reported as [`SessionError::AuthResponseMalformed`].
pub fn identity_from_login_payload(
    body: &Value,
    conventions: &ResponseConventions,
) -> Result<Identity, SessionError> {
    let Some(fields) = body.as_object() else {
        return Err(malformed("login response is not a JSON object".to_string()));
    };

    let record = match fields.get(&conventions.identity_field) {
        Some(record @ Value::Object(_)) => record,
        Some(other) => {
            return Err(malformed(format!(
                "`{}` is not an object: {}",
                conventions.identity_field,
                type_name(other)
            )));
        }
        None => {
            return Err(malformed(format!(
                "missing `{}` in login response",
                conventions.identity_field
            )));
        }
    };

    let mut identity = Identity::deserialize(record)
        .map_err(|e| malformed(format!("undecodable `{}`: {}", conventions.identity_field, e)))?;

    // Inside the identity record first, then at the top level
    identity.credential = [record, body]
        .into_iter()
        .filter_map(|object| object.get(&conventions.credential_field))
        .find_map(wire::text_value)
        .and_then(Credential::new);

    if identity.credential.is_none() {
        return Err(malformed(format!(
            "login response carries no `{}`",
            conventions.credential_field
        )));
    }

    Ok(identity)
}

fn malformed(detail: String) -> SessionError {
    warn!("Malformed authentication response: {}", detail);
    SessionError::AuthResponseMalformed(detail)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
