//! Transaction ledger
//!
//! Tracks the last known state of each transaction as reported by the three
//! channels that can touch it: initiation, the gateway webhook and the
//! browser return. Any of them may arrive first, twice or never.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::payments::types::{CustomerContact, PaymentState};

pub use memory::InMemoryLedger;

/// Snapshot of a transaction. Serialised with the camelCase names callers
/// see on the debug and status endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub amount: String,
    pub status: PaymentState,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub payment_type: Option<String>,
    pub auth_token: Option<String>,
    pub decrypted_data: Option<String>,
}

/// Metadata captured when a payment is initiated
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub amount: String,
    pub customer: CustomerContact,
    pub payment_type: Option<String>,
    pub auth_token: Option<String>,
}

/// Where an outcome came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Listener,
    Return,
    StatusQuery,
}

/// Result reported by the gateway for one transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub state: PaymentState,
    pub source: OutcomeSource,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub auth_token: Option<String>,
    pub decrypted_data: Option<String>,
}

impl Outcome {
    pub fn new(state: PaymentState, source: OutcomeSource) -> Self {
        Self {
            state,
            source,
            response_code: None,
            response_message: None,
            auth_token: None,
            decrypted_data: None,
        }
    }

    pub fn with_response(mut self, code: Option<String>, message: Option<String>) -> Self {
        self.response_code = code;
        self.response_message = message;
        self
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn with_decrypted_data(mut self, data: Option<String>) -> Self {
        self.decrypted_data = data;
        self
    }
}

impl TransactionRecord {
    pub fn pending(transaction_id: &str, new: NewTransaction, now: DateTime<Utc>) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            amount: new.amount,
            status: PaymentState::Pending,
            response_code: None,
            response_message: None,
            created_at: now,
            paid_at: None,
            failed_at: None,
            returned_at: None,
            customer_email: new.customer.email,
            customer_name: new.customer.name,
            customer_mobile: new.customer.mobile,
            payment_type: new.payment_type,
            auth_token: new.auth_token,
            decrypted_data: None,
        }
    }

    /// Applies `outcome`. Timestamps keep their first value, so applying the
    /// same outcome again leaves the record unchanged. A conflicting outcome
    /// overwrites status and response fields.
    pub fn apply(&mut self, outcome: &Outcome, now: DateTime<Utc>) {
        self.status = outcome.state;
        if outcome.response_code.is_some() {
            self.response_code = outcome.response_code.clone();
        }
        if outcome.response_message.is_some() {
            self.response_message = outcome.response_message.clone();
        }
        if outcome.auth_token.is_some() {
            self.auth_token = outcome.auth_token.clone();
        }
        if outcome.decrypted_data.is_some() {
            self.decrypted_data = outcome.decrypted_data.clone();
        }

        match outcome.state {
            PaymentState::Success => {
                self.paid_at.get_or_insert(now);
            }
            PaymentState::Failed => {
                self.failed_at.get_or_insert(now);
            }
            PaymentState::Pending => {}
        }
        if outcome.source == OutcomeSource::Return {
            self.returned_at.get_or_insert(now);
        }
    }

    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        ttl.map(|ttl| now - self.created_at > ttl).unwrap_or(false)
    }
}

/// Retention bounds. `None` disables a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPolicy {
    pub ttl: Option<Duration>,
    pub max_entries: Option<usize>,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::seconds(86_400)),
            max_entries: Some(10_000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger backend unavailable: {0}")]
    Unavailable(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[async_trait]
pub trait TransactionLedger: Send + Sync {
    /// Inserts a pending record, replacing any record with the same id.
    async fn create(
        &self,
        transaction_id: &str,
        new: NewTransaction,
    ) -> LedgerResult<TransactionRecord>;

    async fn get(&self, transaction_id: &str) -> LedgerResult<Option<TransactionRecord>>;

    /// Returns the updated record, or `None` when the id is unknown.
    async fn apply_result(
        &self,
        transaction_id: &str,
        outcome: Outcome,
    ) -> LedgerResult<Option<TransactionRecord>>;

    async fn len(&self) -> LedgerResult<usize>;
}

impl From<LedgerError> for crate::error::AppError {
    fn from(err: LedgerError) -> Self {
        crate::error::AppError::new(crate::error::AppErrorKind::External(
            crate::error::ExternalError::Unavailable {
                service: "ledger".to_string(),
                message: err.to_string(),
            },
        ))
    }
}
