use crate::payments::error::PaymentError;
use crate::payments::fields::OrderedFields;
use crate::payments::utils::json_field_str;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Success => "success",
            PaymentState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `TransactionTypeId` understood by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Wallet,
    BankAccount,
    Card,
}

impl TransactionType {
    pub fn type_id(&self) -> &'static str {
        match self {
            TransactionType::Wallet => "1",
            TransactionType::BankAccount => "2",
            TransactionType::Card => "3",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Wallet => "wallet",
            TransactionType::BankAccount => "bank",
            TransactionType::Card => "card",
        }
    }
}

impl FromStr for TransactionType {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "1" | "wallet" => Ok(TransactionType::Wallet),
            "2" | "bank" | "bank_account" => Ok(TransactionType::BankAccount),
            "3" | "card" => Ok(TransactionType::Card),
            _ => Err(PaymentError::validation(
                "type",
                format!("unsupported payment type: {}", value),
            )),
        }
    }
}

/// Decimal amount fixed to two fractional digits.
///
/// Rounding is half-up (midpoint away from zero) on the exact decimal value:
/// `100.005` becomes `100.01`, `100.004` becomes `100.00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Amount(Decimal);

impl Amount {
    pub fn parse(raw: &str) -> Result<Self, PaymentError> {
        let trimmed = raw.trim();
        let parsed = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| PaymentError::validation("amount", "Invalid amount"))?;
        if parsed <= Decimal::ZERO {
            return Err(PaymentError::validation(
                "amount",
                "amount must be greater than zero",
            ));
        }

        let mut rounded = parsed.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        if rounded <= Decimal::ZERO {
            return Err(PaymentError::validation(
                "amount",
                "amount must be at least 0.01",
            ));
        }
        Ok(Self(rounded))
    }

    /// Accepts the JSON shapes callers send: numbers or numeric strings.
    pub fn from_json(value: &JsonValue) -> Result<Self, PaymentError> {
        match value {
            JsonValue::String(s) => Self::parse(s),
            // shortest round-trip formatting gives back the literal digits,
            // so 100.005 is rounded as a decimal, not as a binary float
            JsonValue::Number(n) => Self::parse(&n.to_string()),
            _ => Err(PaymentError::validation("amount", "Invalid amount")),
        }
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerContact {
    pub email: Option<String>,
    pub name: Option<String>,
    pub mobile: Option<String>,
}

/// Direct page-redirect payment (`HS_*` form posted by the browser)
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub transaction_id: String,
    pub amount: Amount,
    pub customer: CustomerContact,
    /// `HS_TransactionTypeId`, defaults to card
    pub transaction_type: Option<String>,
    /// `HS_IsRedirectionRequest`, defaults to `"1"`
    pub is_redirection_request: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub payment_url: String,
    pub payment_fields: OrderedFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandshakeResponse {
    pub auth_token: String,
    pub raw: JsonValue,
}

/// Action URL plus the fields the customer's browser must submit to it
#[derive(Debug, Clone, Serialize)]
pub struct RedirectForm {
    pub action: String,
    pub fields: OrderedFields,
}

/// IPN order-status answer, kept raw with the fields we classify on
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub response_code: Option<String>,
    pub transaction_status: Option<String>,
    pub description: Option<String>,
    pub raw: JsonValue,
}

impl StatusResponse {
    pub fn from_raw(raw: JsonValue) -> Self {
        Self {
            response_code: json_field_str(&raw, "ResponseCode"),
            transaction_status: json_field_str(&raw, "TransactionStatus"),
            description: json_field_str(&raw, "Description"),
            raw,
        }
    }

    /// `ResponseCode == "00"` and `TransactionStatus` is "paid" in any case.
    pub fn is_paid(&self) -> bool {
        self.response_code.as_deref() == Some("00")
            && self
                .transaction_status
                .as_deref()
                .map(|s| s.eq_ignore_ascii_case("paid"))
                .unwrap_or(false)
    }

    pub fn state(&self) -> PaymentState {
        if self.is_paid() {
            PaymentState::Success
        } else {
            PaymentState::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_rounds_half_up_to_two_places() {
        assert_eq!(Amount::parse("100.005").unwrap().to_string(), "100.01");
        assert_eq!(Amount::parse("100.004").unwrap().to_string(), "100.00");
        assert_eq!(Amount::parse("0.125").unwrap().to_string(), "0.13");
        assert_eq!(Amount::parse("2.675").unwrap().to_string(), "2.68");
        assert_eq!(Amount::parse("5").unwrap().to_string(), "5.00");
        assert_eq!(Amount::parse(" 1500.5 ").unwrap().to_string(), "1500.50");
    }

    #[test]
    fn amount_accepts_json_numbers_and_strings() {
        assert_eq!(
            Amount::from_json(&json!(100.005)).unwrap().to_string(),
            "100.01"
        );
        assert_eq!(Amount::from_json(&json!(250)).unwrap().to_string(), "250.00");
        assert_eq!(
            Amount::from_json(&json!("99.999")).unwrap().to_string(),
            "100.00"
        );
        assert_eq!(Amount::from_json(&json!(1e3)).unwrap().to_string(), "1000.00");
    }

    #[test]
    fn amount_rejects_non_positive_or_garbage() {
        for raw in ["0", "-5", "abc", "", "0.004"] {
            assert!(
                matches!(
                    Amount::parse(raw),
                    Err(PaymentError::ValidationError { .. })
                ),
                "expected rejection for {:?}",
                raw
            );
        }
        assert!(Amount::from_json(&json!(null)).is_err());
        assert!(Amount::from_json(&json!(true)).is_err());
    }

    #[test]
    fn transaction_type_parsing_works() {
        assert_eq!(
            TransactionType::from_str("1").unwrap(),
            TransactionType::Wallet
        );
        assert_eq!(
            TransactionType::from_str("card").unwrap().type_id(),
            "3"
        );
        assert_eq!(TransactionType::from_str("2").unwrap().label(), "bank");
        assert!(TransactionType::from_str("9").is_err());
    }

    #[test]
    fn payment_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(PaymentState::Success).unwrap(),
            json!("success")
        );
    }

    #[test]
    fn status_success_requires_code_00_and_paid() {
        let paid = StatusResponse::from_raw(json!({
            "ResponseCode": "00",
            "TransactionStatus": "paid"
        }));
        assert!(paid.is_paid());
        assert_eq!(paid.state(), PaymentState::Success);

        let upper = StatusResponse::from_raw(json!({
            "ResponseCode": "00",
            "TransactionStatus": "PAID"
        }));
        assert!(upper.is_paid());

        let wrong_code = StatusResponse::from_raw(json!({
            "ResponseCode": "01",
            "TransactionStatus": "paid"
        }));
        assert!(!wrong_code.is_paid());

        let pending = StatusResponse::from_raw(json!({
            "ResponseCode": "00",
            "TransactionStatus": "pending"
        }));
        assert!(!pending.is_paid());
        assert_eq!(pending.state(), PaymentState::Failed);

        assert!(!StatusResponse::from_raw(json!({})).is_paid());
    }
}
