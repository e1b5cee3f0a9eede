//! Service error taxonomy
//!
//! Business errors carry an integer code + message that the response layer
//! echoes to clients; everything else renders as a generic 500.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("code: {code}, message: {message}")]
pub struct BusinessError {
    pub code: u16,
    pub message: String,
}

impl BusinessError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(401, "unauthorized")
    }

    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self::new(400, detail)
    }

    pub fn session_not_found() -> Self {
        Self::new(404, "chat session not found")
    }

    pub fn model_not_found() -> Self {
        Self::new(404, "model not found")
    }

    pub fn provider_not_found() -> Self {
        Self::new(404, "provider not found")
    }

    pub fn provider_not_configured() -> Self {
        Self::new(400, "provider API key is not configured")
    }

    pub fn provider_already_exists() -> Self {
        Self::new(409, "provider with this name already exists")
    }

    pub fn model_already_exists() -> Self {
        Self::new(409, "model with this name or code already exists")
    }

    pub fn provider_in_use() -> Self {
        Self::new(400, "provider has models; delete them first or pass force=true")
    }

    pub fn deleting_default_model() -> Self {
        Self::new(400, "cannot delete the default model")
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Business(#[from] BusinessError),

    #[error(transparent)]
    Ai(#[from] agenty_ai::AiError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    /// The business error inside, if this is one.
    pub fn business(&self) -> Option<&BusinessError> {
        match self {
            Self::Business(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_error_is_extractable() {
        let err: ServiceError = BusinessError::model_not_found().into();
        assert_eq!(err.business().unwrap().code, 404);
    }

    #[test]
    fn internal_error_is_not_business() {
        let err: ServiceError = anyhow::anyhow!("db down").into();
        assert!(err.business().is_none());
    }
}
