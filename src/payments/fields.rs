//! Field sets sent to the gateway, one type per call.
//!
//! The gateway recomputes the request hash over the exact string we encrypt,
//! so each type fixes its field order explicitly instead of relying on map
//! iteration order:
//!
//! | call | convention | order |
//! |---|---|---|
//! | handshake | `key=value` joined by `&` | [`HandshakeFields::KEYS`] |
//! | SSO redirect | `key=value` joined by `&` | [`SsoFields::KEYS`] (`RequestHash` empty while hashing) |
//! | page-redirect payment | values joined by `\|` | [`PaymentInitiationFields`] field order |
//! | status query | URL path segments | merchant, store, order |

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::payments::envelope::FIELD_SEPARATOR;
use crate::payments::error::{PaymentError, PaymentResult};

/// Ordered `name -> value` list that serialises as a JSON object with the
/// same key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedFields(Vec<(&'static str, String)>);

impl OrderedFields {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|(k, _)| *k)
    }

    pub fn as_pairs(&self) -> &[(&'static str, String)] {
        &self.0
    }

    /// `k1=v1&k2=v2...` without any escaping; the gateway hashes the raw text.
    pub fn to_key_value_string(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl Serialize for OrderedFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Merchant credentials shared by every call
#[derive(Debug, Clone)]
pub struct MerchantCredentials {
    pub channel_id: String,
    pub merchant_id: String,
    pub store_id: String,
    pub merchant_hash: String,
    pub merchant_username: String,
    pub merchant_password: String,
}

/// Step 1 of the SSO flow: exchanges credentials for an `AuthToken`.
#[derive(Debug, Clone)]
pub struct HandshakeFields {
    pub channel_id: String,
    pub merchant_id: String,
    pub store_id: String,
    pub return_url: String,
    pub merchant_hash: String,
    pub merchant_username: String,
    pub merchant_password: String,
    pub transaction_reference: String,
    /// `"0"` asks for a JSON answer, `"1"` for a browser redirect
    pub is_redirection_request: String,
}

impl HandshakeFields {
    pub const KEYS: [&'static str; 9] = [
        "HS_ChannelId",
        "HS_MerchantId",
        "HS_StoreId",
        "HS_ReturnURL",
        "HS_MerchantHash",
        "HS_MerchantUsername",
        "HS_MerchantPassword",
        "HS_TransactionReferenceNumber",
        "HS_IsRedirectionRequest",
    ];

    pub fn new(credentials: &MerchantCredentials, return_url: &str, order_id: &str) -> Self {
        Self {
            channel_id: credentials.channel_id.clone(),
            merchant_id: credentials.merchant_id.clone(),
            store_id: credentials.store_id.clone(),
            return_url: return_url.to_string(),
            merchant_hash: credentials.merchant_hash.clone(),
            merchant_username: credentials.merchant_username.clone(),
            merchant_password: credentials.merchant_password.clone(),
            transaction_reference: order_id.to_string(),
            is_redirection_request: "0".to_string(),
        }
    }

    pub fn to_fields(&self) -> OrderedFields {
        let values = [
            self.channel_id.as_str(),
            self.merchant_id.as_str(),
            self.store_id.as_str(),
            self.return_url.as_str(),
            self.merchant_hash.as_str(),
            self.merchant_username.as_str(),
            self.merchant_password.as_str(),
            self.transaction_reference.as_str(),
            self.is_redirection_request.as_str(),
        ];
        let mut fields = OrderedFields::new();
        for (key, value) in Self::KEYS.into_iter().zip(values) {
            fields.push(key, value);
        }
        fields
    }

    /// Plaintext for `HS_RequestHash`
    pub fn to_encoded_form(&self) -> String {
        self.to_fields().to_key_value_string()
    }

    /// Form body for the handshake POST, hash appended last
    pub fn into_signed_form(self, request_hash: String) -> OrderedFields {
        let mut fields = self.to_fields();
        fields.push("HS_RequestHash", request_hash);
        fields
    }
}

/// Step 2 of the SSO flow: the form the customer's browser submits.
#[derive(Debug, Clone)]
pub struct SsoFields {
    pub auth_token: String,
    pub channel_id: String,
    pub currency: String,
    pub is_bin: String,
    pub return_url: String,
    pub merchant_id: String,
    pub store_id: String,
    pub merchant_hash: String,
    pub merchant_username: String,
    pub merchant_password: String,
    pub transaction_type_id: String,
    pub transaction_reference: String,
    pub transaction_amount: String,
}

impl SsoFields {
    pub const KEYS: [&'static str; 14] = [
        "AuthToken",
        "RequestHash",
        "ChannelId",
        "Currency",
        "IsBIN",
        "ReturnURL",
        "MerchantId",
        "StoreId",
        "MerchantHash",
        "MerchantUsername",
        "MerchantPassword",
        "TransactionTypeId",
        "TransactionReferenceNumber",
        "TransactionAmount",
    ];

    fn with_request_hash(&self, request_hash: &str) -> OrderedFields {
        let values = [
            self.auth_token.as_str(),
            request_hash,
            self.channel_id.as_str(),
            self.currency.as_str(),
            self.is_bin.as_str(),
            self.return_url.as_str(),
            self.merchant_id.as_str(),
            self.store_id.as_str(),
            self.merchant_hash.as_str(),
            self.merchant_username.as_str(),
            self.merchant_password.as_str(),
            self.transaction_type_id.as_str(),
            self.transaction_reference.as_str(),
            self.transaction_amount.as_str(),
        ];
        let mut fields = OrderedFields::new();
        for (key, value) in Self::KEYS.into_iter().zip(values) {
            fields.push(key, value);
        }
        fields
    }

    /// Plaintext for `RequestHash`; the hash slot itself is hashed empty.
    pub fn to_encoded_form(&self) -> String {
        self.with_request_hash("").to_key_value_string()
    }

    pub fn into_signed_form(self, request_hash: String) -> OrderedFields {
        self.with_request_hash(&request_hash)
    }
}

/// Positional payment string for the direct page-redirect flow.
#[derive(Debug, Clone)]
pub struct PaymentInitiationFields {
    pub channel_id: String,
    pub currency: String,
    pub amount: String,
    pub transaction_id: String,
    pub description: String,
    pub customer_email: String,
    pub customer_mobile: String,
    pub return_url: String,
}

impl PaymentInitiationFields {
    /// Index of the transaction id once decrypted and split
    pub const TRANSACTION_ID_INDEX: usize = 3;

    fn values(&self) -> [(&'static str, &str); 8] {
        [
            ("channelId", self.channel_id.as_str()),
            ("currency", self.currency.as_str()),
            ("amount", self.amount.as_str()),
            ("transactionId", self.transaction_id.as_str()),
            ("description", self.description.as_str()),
            ("customerEmail", self.customer_email.as_str()),
            ("customerMobile", self.customer_mobile.as_str()),
            ("returnUrl", self.return_url.as_str()),
        ]
    }

    /// Values joined with `|`. A value containing the separator would shift
    /// every later position, so it is rejected.
    pub fn to_encoded_form(&self) -> PaymentResult<String> {
        let values = self.values();
        if let Some((name, _)) = values.iter().find(|(_, v)| v.contains(FIELD_SEPARATOR)) {
            return Err(PaymentError::validation(
                name,
                format!("{} must not contain '{}'", name, FIELD_SEPARATOR),
            ));
        }
        Ok(values
            .iter()
            .map(|(_, v)| *v)
            .collect::<Vec<_>>()
            .join("|"))
    }
}

/// IPN order-status lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusQuery {
    pub merchant_id: String,
    pub store_id: String,
    pub order_id: String,
}

impl StatusQuery {
    pub fn path(&self) -> String {
        format!(
            "/HS/api/IPN/OrderStatus/{}/{}/{}",
            encode_segment(&self.merchant_id),
            encode_segment(&self.store_id),
            encode_segment(&self.order_id)
        )
    }
}

fn encode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
