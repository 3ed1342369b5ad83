//! Unified error handling for the gateway service
//!
//! Every handler-level failure is expressed as an [`AppError`] which carries
//! the HTTP status mapping, a machine-readable [`ErrorCode`] and a message
//! that is safe to return to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling by API clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INVALID_AMOUNT")]
    InvalidAmount,
    #[serde(rename = "ENCRYPTION_ERROR")]
    EncryptionError,
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "GATEWAY_UNAVAILABLE")]
    GatewayUnavailable,
}

/// Business-level errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No ledger record exists for the identifier
    TransactionNotFound { transaction_id: String },
}

/// Local failures that are not the caller's fault
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Envelope encryption/decryption failed (bad secrets, corrupted payload)
    Encryption { message: String },
}

/// Failures reported by, or while reaching, the bank gateway
#[derive(Debug, Clone)]
pub enum ExternalError {
    Gateway {
        provider: String,
        message: String,
        provider_code: Option<String>,
    },
    Unavailable { service: String, message: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    InvalidAmount { amount: String, reason: String },
    InvalidField { field: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn not_found(transaction_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::TransactionNotFound {
            transaction_id: transaction_id.into(),
        }))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(DomainError::TransactionNotFound { .. }) => 404,
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => 502,
                ExternalError::Unavailable { .. } => 503,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::TransactionNotFound { .. }) => {
                ErrorCode::TransactionNotFound
            }
            AppErrorKind::Infrastructure(InfrastructureError::Encryption { .. }) => {
                ErrorCode::EncryptionError
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => ErrorCode::GatewayError,
                ExternalError::Unavailable { .. } => ErrorCode::GatewayUnavailable,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidAmount { .. } => ErrorCode::InvalidAmount,
                _ => ErrorCode::ValidationError,
            },
        }
    }

    /// Message returned to the API caller
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(DomainError::TransactionNotFound { transaction_id }) => {
                format!(
                    "Transaction '{}' not found. It may have expired.",
                    transaction_id
                )
            }
            AppErrorKind::Infrastructure(InfrastructureError::Encryption { .. }) => {
                "Encryption failed. Please check your encryption keys.".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { message, .. } => message.clone(),
                ExternalError::Unavailable { service, .. } => {
                    format!("{} is temporarily unavailable", service)
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Missing required fields: {}", field)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidField { reason, .. } => reason.clone(),
            },
        }
    }

    /// Internal detail for logs; never sent to clients
    pub fn detail(&self) -> Option<&str> {
        match &self.kind {
            AppErrorKind::Infrastructure(InfrastructureError::Encryption { message })
            | AppErrorKind::External(ExternalError::Unavailable { message, .. }) => {
                Some(message.as_str())
            }
            _ => self.context.as_deref(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            AppErrorKind::External(ExternalError::Unavailable { .. })
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;
