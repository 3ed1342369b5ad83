use crate::payments::error::PaymentResult;
use crate::payments::types::{
    Amount, HandshakeResponse, PaymentRequest, PaymentResponse, RedirectForm, StatusResponse,
    TransactionType,
};
use async_trait::async_trait;

/// Outbound side of the bank gateway plus decryption of what it sends back.
///
/// Handlers only talk to this trait so tests can swap in a fake gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Builds the encrypted `HS_*` page-redirect form. No network call.
    fn initiate_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse>;

    /// Exchanges merchant credentials for an `AuthToken`.
    async fn handshake(&self, order_id: &str) -> PaymentResult<HandshakeResponse>;

    /// Assembles the SSO form for client-side submission. No network call.
    fn build_redirect_form(
        &self,
        auth_token: &str,
        order_id: &str,
        amount: &Amount,
        payment_type: TransactionType,
    ) -> PaymentResult<RedirectForm>;

    /// IPN order-status lookup.
    async fn query_status(&self, order_id: &str) -> PaymentResult<StatusResponse>;

    /// Decrypts a `RequestHash` received on the listener or return URL.
    fn decrypt_callback(&self, request_hash: &str) -> PaymentResult<String>;

    fn name(&self) -> &'static str;
}
