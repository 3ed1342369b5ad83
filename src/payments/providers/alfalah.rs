use crate::config::AlfalahConfig;
use crate::logging::mask_secret;
use crate::payments::envelope::EnvelopeCodec;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::fields::{
    HandshakeFields, OrderedFields, PaymentInitiationFields, SsoFields, StatusQuery,
};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    Amount, HandshakeResponse, PaymentRequest, PaymentResponse, RedirectForm, StatusResponse,
    TransactionType,
};
use crate::payments::utils::{json_field_str, PaymentHttpClient};
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub const PROVIDER_NAME: &str = "alfalah";

const HANDSHAKE_PATH: &str = "/HS/HS/HS";
const SSO_PATH: &str = "/SSO/SSO/SSO";
const PAYMENT_DESCRIPTION: &str = "Order Payment";
const DEFAULT_TRANSACTION_TYPE: &str = "3";
const DEFAULT_REDIRECTION_FLAG: &str = "1";

/// Bank Alfalah hosted-checkout client.
pub struct AlfalahGateway {
    config: AlfalahConfig,
    http: PaymentHttpClient,
}

impl AlfalahGateway {
    pub fn new(config: AlfalahConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(PROVIDER_NAME, config.timeout())?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Secrets are checked on every use so an undersized key fails the
    /// request instead of the process.
    fn codec(&self) -> PaymentResult<EnvelopeCodec> {
        EnvelopeCodec::new(&self.config.key1, &self.config.key2).map_err(|e| {
            PaymentError::EncryptionError {
                message: e.to_string(),
            }
        })
    }

    fn sign(&self, plaintext: &str) -> PaymentResult<String> {
        self.codec()?.encode(plaintext)
    }
}

#[async_trait]
impl PaymentGateway for AlfalahGateway {
    fn initiate_payment(&self, request: &PaymentRequest) -> PaymentResult<PaymentResponse> {
        if request.transaction_id.trim().is_empty() {
            return Err(PaymentError::validation(
                "transactionId",
                "transactionId is required",
            ));
        }

        let amount = request.amount.to_string();
        let initiation = PaymentInitiationFields {
            channel_id: self.config.channel_id.clone(),
            currency: self.config.currency.clone(),
            amount: amount.clone(),
            transaction_id: request.transaction_id.clone(),
            description: PAYMENT_DESCRIPTION.to_string(),
            customer_email: request.customer.email.clone().unwrap_or_default(),
            customer_mobile: request.customer.mobile.clone().unwrap_or_default(),
            return_url: self.config.return_url.clone(),
        };
        let request_hash = self.sign(&initiation.to_encoded_form()?)?;

        let credentials = self.config.credentials();
        let mut fields = OrderedFields::new();
        fields.push("HS_ChannelId", credentials.channel_id);
        fields.push("HS_MerchantId", credentials.merchant_id);
        fields.push("HS_StoreId", credentials.store_id);
        fields.push("HS_MerchantHash", credentials.merchant_hash);
        fields.push("HS_MerchantUsername", credentials.merchant_username);
        fields.push("HS_MerchantPassword", credentials.merchant_password);
        fields.push("HS_TransactionReferenceNumber", &request.transaction_id);
        fields.push("HS_TransactionAmount", amount);
        fields.push("HS_TransactionDescription", PAYMENT_DESCRIPTION);
        fields.push("HS_RequestHash", request_hash);
        fields.push(
            "HS_IsRedirectionRequest",
            request
                .is_redirection_request
                .as_deref()
                .unwrap_or(DEFAULT_REDIRECTION_FLAG),
        );
        fields.push("HS_ReturnURL", &self.config.return_url);
        fields.push("HS_ListenerURL", &self.config.listener_url);
        fields.push(
            "HS_TransactionTypeId",
            request
                .transaction_type
                .as_deref()
                .unwrap_or(DEFAULT_TRANSACTION_TYPE),
        );

        info!(
            transaction_id = %request.transaction_id,
            amount = %request.amount,
            "alfalah page-redirect payment prepared"
        );

        Ok(PaymentResponse {
            payment_url: self.config.payment_url.clone(),
            payment_fields: fields,
        })
    }

    async fn handshake(&self, order_id: &str) -> PaymentResult<HandshakeResponse> {
        let fields = HandshakeFields::new(
            &self.config.credentials(),
            &self.config.return_url,
            order_id,
        );
        let request_hash = self.sign(&fields.to_encoded_form())?;
        debug!(
            order_id = %order_id,
            merchant_password = %mask_secret(&self.config.merchant_password),
            request_hash = %mask_secret(&request_hash),
            "sending alfalah handshake"
        );

        let raw = self
            .http
            .post_form(
                &self.endpoint(HANDSHAKE_PATH),
                &fields.into_signed_form(request_hash),
            )
            .await
            .map_err(|e| match e {
                PaymentError::ProviderError { message, .. } => {
                    PaymentError::HandshakeError { message }
                }
                other => other,
            })?;

        let auth_token = json_field_str(&raw, "AuthToken")
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                let message = json_field_str(&raw, "ErrorMessage")
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "No AuthToken received from gateway".to_string());
                warn!(order_id = %order_id, error = %message, "alfalah handshake rejected");
                PaymentError::HandshakeError { message }
            })?;

        info!(order_id = %order_id, "alfalah handshake succeeded");
        Ok(HandshakeResponse { auth_token, raw })
    }

    fn build_redirect_form(
        &self,
        auth_token: &str,
        order_id: &str,
        amount: &Amount,
        payment_type: TransactionType,
    ) -> PaymentResult<RedirectForm> {
        let credentials = self.config.credentials();
        let sso = SsoFields {
            auth_token: auth_token.to_string(),
            channel_id: credentials.channel_id,
            currency: self.config.currency.clone(),
            is_bin: "0".to_string(),
            return_url: self.config.return_url.clone(),
            merchant_id: credentials.merchant_id,
            store_id: credentials.store_id,
            merchant_hash: credentials.merchant_hash,
            merchant_username: credentials.merchant_username,
            merchant_password: credentials.merchant_password,
            transaction_type_id: payment_type.type_id().to_string(),
            transaction_reference: order_id.to_string(),
            transaction_amount: amount.to_string(),
        };
        let request_hash = self.sign(&sso.to_encoded_form())?;

        Ok(RedirectForm {
            action: self.endpoint(SSO_PATH),
            fields: sso.into_signed_form(request_hash),
        })
    }

    async fn query_status(&self, order_id: &str) -> PaymentResult<StatusResponse> {
        if order_id.trim().is_empty() {
            return Err(PaymentError::validation("orderId", "orderId is required"));
        }

        let query = StatusQuery {
            merchant_id: self.config.merchant_id.clone(),
            store_id: self.config.store_id.clone(),
            order_id: order_id.to_string(),
        };
        let raw = self.http.get_json(&self.endpoint(&query.path())).await?;
        let status = StatusResponse::from_raw(raw);

        info!(
            order_id = %order_id,
            response_code = ?status.response_code,
            transaction_status = ?status.transaction_status,
            paid = status.is_paid(),
            "alfalah status queried"
        );
        Ok(status)
    }

    fn decrypt_callback(&self, request_hash: &str) -> PaymentResult<String> {
        EnvelopeCodec::new(&self.config.key1, &self.config.key2)
            .map_err(|e| PaymentError::DecryptionError {
                message: e.to_string(),
            })?
            .decode(request_hash)
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}
