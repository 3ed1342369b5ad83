use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::fields::OrderedFields;
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

/// Thin reqwest wrapper for gateway calls. Each call is made exactly once;
/// failures go back to the caller.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    provider: &'static str,
}

impl PaymentHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self { client, provider })
    }

    /// POSTs `fields` as `application/x-www-form-urlencoded`, keeping their order.
    pub async fn post_form(&self, url: &str, fields: &OrderedFields) -> PaymentResult<JsonValue> {
        let request = self.client.post(url).form(fields.as_pairs());
        self.send(request, url).await
    }

    pub async fn get_json(&self, url: &str) -> PaymentResult<JsonValue> {
        let request = self.client.get(url);
        self.send(request, url).await
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> PaymentResult<JsonValue> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("gateway request failed: {}", e),
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("failed to read gateway response: {}", e),
            })?;
        debug!(url = %url, status = %status, "gateway responded");

        if !status.is_success() {
            warn!(provider = self.provider, status = %status, "gateway returned non-success status");
            return Err(PaymentError::ProviderError {
                provider: self.provider.to_string(),
                message: format!("HTTP {}: {}", status, text),
                provider_code: Some(status.as_u16().to_string()),
            });
        }

        parse_gateway_json(self.provider, &text)
    }
}

/// The gateway sometimes answers with a JSON document serialised inside a
/// JSON string; both shapes yield the inner object.
pub fn parse_gateway_json(provider: &str, text: &str) -> PaymentResult<JsonValue> {
    let invalid = |e: serde_json::Error| PaymentError::ProviderError {
        provider: provider.to_string(),
        message: format!("invalid gateway JSON response: {}", e),
        provider_code: None,
    };

    let value: JsonValue = serde_json::from_str(text.trim()).map_err(invalid)?;
    match value {
        JsonValue::String(inner) => serde_json::from_str(inner.trim()).map_err(invalid),
        other => Ok(other),
    }
}

/// Reads a field as text whether the gateway sent it as a string or a number.
pub fn json_field_str(value: &JsonValue, key: &str) -> Option<String> {
    json_scalar_str(value.get(key)?)
}

pub fn json_scalar_str(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
