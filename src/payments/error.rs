use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Encryption failed: {message}")]
    EncryptionError { message: String },

    #[error("Decryption failed: {message}")]
    DecryptionError { message: String },

    #[error("Handshake failed: {message}")]
    HandshakeError { message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        provider_code: Option<String>,
    },
}

impl PaymentError {
    /// Nothing in this service retries; this only describes the failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::EncryptionError { .. } => false,
            PaymentError::DecryptionError { .. } => false,
            PaymentError::HandshakeError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::ProviderError { provider_code, .. } => provider_code
                .as_deref()
                .and_then(|code| code.parse::<u16>().ok())
                .map(|code| code >= 500)
                .unwrap_or(false),
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::EncryptionError { .. } => 500,
            PaymentError::DecryptionError { .. } => 500,
            PaymentError::HandshakeError { .. } => 502,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::ProviderError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::EncryptionError { .. } => {
                "Encryption failed. Please check your encryption keys.".to_string()
            }
            PaymentError::DecryptionError { .. } => {
                "Gateway payload could not be decrypted".to_string()
            }
            PaymentError::HandshakeError { message } => format!("Handshake failed: {}", message),
            PaymentError::NetworkError { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            PaymentError::ProviderError { .. } => "Payment gateway returned an error".to_string(),
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        PaymentError::ValidationError {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{
            AppError, AppErrorKind, ExternalError, InfrastructureError, ValidationError,
        };

        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::EncryptionError { message } | PaymentError::DecryptionError { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Encryption { message })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::Unavailable {
                    service: "alfalah".to_string(),
                    message,
                })
            }
            PaymentError::HandshakeError { message } => {
                AppErrorKind::External(ExternalError::Gateway {
                    provider: "alfalah".to_string(),
                    message: format!("Handshake failed: {}", message),
                    provider_code: None,
                })
            }
            PaymentError::ProviderError {
                provider,
                message,
                provider_code,
            } => AppErrorKind::External(ExternalError::Gateway {
                provider,
                message,
                provider_code,
            }),
        };

        AppError::new(kind)
    }
}
