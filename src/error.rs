use thiserror::Error;

/// Wording used when the backend gives no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Não foi possível concluir a operação. Tente novamente mais tarde.";

/// Failures surfaced by the session manager and the request dispatcher.
///
/// Every failure path yields one of these variants; the UI layer maps them to
/// user-visible messages through [`SessionError::user_message`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Authenticated call attempted without an active session.
    #[error("No active session")]
    SessionInvalid,

    /// Login rejected by the server.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Login accepted at transport level but the payload lacks required fields.
    #[error("Malformed authentication response: {0}")]
    AuthResponseMalformed(String),

    /// Network failure, timeout or non-2xx status.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        retryable: bool,
    },

    /// 2xx response whose body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Well-formed response that explicitly signals failure.
    #[error("{0}")]
    Application(String),

    /// Durable persistence operation failed.
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Identity handed to the session manager violates its contract.
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Request could not be built; no I/O was performed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    pub fn transport(message: impl Into<String>, status: Option<u16>, retryable: bool) -> Self {
        Self::Transport {
            message: message.into(),
            status,
            retryable,
        }
    }

    pub fn timeout(elapsed_ms: u128) -> Self {
        Self::transport(format!("request timed out after {}ms", elapsed_ms), None, true)
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether the failure means the user must log in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, SessionError::SessionInvalid)
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::SessionInvalid => "Sua sessão expirou. Faça login novamente.".to_string(),
            SessionError::AuthenticationFailed { message } => message.clone(),
            SessionError::Transport { .. } => {
                "Não foi possível conectar ao servidor. Verifique sua conexão.".to_string()
            }
            SessionError::Application(message) => message.clone(),
            SessionError::AuthResponseMalformed(_)
            | SessionError::MalformedResponse(_)
            | SessionError::Storage(_)
            | SessionError::InvalidIdentity(_)
            | SessionError::InvalidRequest(_) => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Errors raised by a [`crate::store::CredentialStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store contents: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        SessionError::Storage(error.to_string())
    }
}
