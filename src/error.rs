// Backend error types and user-facing message translation
use std::time::Duration;
use thiserror::Error;

use crate::filter::FilterError;

/// Shown when the reachability probe fails or the backend reports exhausted resources
pub const UNAVAILABLE_MESSAGE: &str = "Serviço temporariamente indisponível. Tente novamente em alguns minutos.";
pub const CONNECTIVITY_MESSAGE: &str = "Problema de conexão. Verifique sua internet e tente novamente.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Credenciais inválidas. Verifique seu email e senha.";
pub const GENERIC_MESSAGE: &str = "Erro no servidor. Tente novamente mais tarde.";

/// Errors from the backend client adapter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BackendError {
    /// Error reported by the backend itself
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("invalid query: {0}")]
    Query(String),

    #[error("missing configuration: {0}")]
    ConfigMissing(&'static str),
}

impl BackendError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        BackendError::Api { status, code: None, message: message.into() }
    }

    pub fn api_with_code(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Api { status, code: Some(code.into()), message: message.into() }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        BackendError::Connection(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        BackendError::Decode(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            BackendError::Connection(_) | BackendError::Timeout(_) => ErrorCategory::Connectivity,
            BackendError::Api { status: 429, .. } => ErrorCategory::Unavailable,
            other => classify(&other.to_string()),
        }
    }

    /// Message suitable for display to an end user
    pub fn user_message(&self) -> String {
        match self.category() {
            ErrorCategory::Unavailable => UNAVAILABLE_MESSAGE.to_string(),
            ErrorCategory::Connectivity => CONNECTIVITY_MESSAGE.to_string(),
            ErrorCategory::InvalidCredentials => INVALID_CREDENTIALS_MESSAGE.to_string(),
            ErrorCategory::Generic => {
                let raw = self.to_string();
                if raw.trim().is_empty() { GENERIC_MESSAGE.to_string() } else { raw }
            }
        }
    }
}

impl From<FilterError> for BackendError {
    fn from(err: FilterError) -> Self {
        BackendError::Query(err.to_string())
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            // Timeouts, refused connections and DNS failures all read as connectivity to the user
            BackendError::Connection(format!("network request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// User-facing error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Unavailable,
    Connectivity,
    InvalidCredentials,
    Generic,
}

/// Classify a raw backend message by substring, first match wins
pub fn classify(message: &str) -> ErrorCategory {
    const UNAVAILABLE: &[&str] = &["insufficient_resources", "quota exceeded", "rate limit"];
    const CONNECTIVITY: &[&str] = &["fetch", "network", "connection"];
    const INVALID_CREDENTIALS: &[&str] = &["Invalid login credentials", "Email not confirmed"];

    if UNAVAILABLE.iter().any(|needle| message.contains(needle)) {
        ErrorCategory::Unavailable
    } else if CONNECTIVITY.iter().any(|needle| message.contains(needle)) {
        ErrorCategory::Connectivity
    } else if INVALID_CREDENTIALS.iter().any(|needle| message.contains(needle)) {
        ErrorCategory::InvalidCredentials
    } else {
        ErrorCategory::Generic
    }
}

/// Translate any backend error into the message shown to users
pub fn user_message(err: &BackendError) -> String {
    err.user_message()
}
