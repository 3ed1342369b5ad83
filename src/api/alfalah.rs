//! Bank Alfalah endpoints, mounted under `/api/alfa`
//!
//! Inbound gateway traffic (`/listener`, `/return`) never answers with an
//! error: failures are logged, the webhook is acknowledged and the browser
//! is redirected.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AlfalahConfig;
use crate::error::{AppError, AppErrorKind, AppResult, ValidationError};
use crate::health::{config_presence, HealthChecker, HealthState};
use crate::ledger::{NewTransaction, Outcome, OutcomeSource, TransactionLedger, TransactionRecord};
use crate::middleware::error::{get_request_id_from_headers, success_response};
use crate::payments::envelope::split_fields;
use crate::payments::fields::PaymentInitiationFields;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    Amount, CustomerContact, PaymentRequest, PaymentState, TransactionType,
};
use crate::payments::utils::{json_field_str, json_scalar_str};

/// Shared handler state
#[derive(Clone)]
pub struct AlfalahState {
    pub gateway: Arc<dyn PaymentGateway>,
    pub ledger: Arc<dyn TransactionLedger>,
    pub config: Arc<AlfalahConfig>,
    pub health: HealthChecker,
}

impl AlfalahState {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        ledger: Arc<dyn TransactionLedger>,
        config: AlfalahConfig,
    ) -> Self {
        let health = HealthChecker::new(config.clone(), ledger.clone());
        Self {
            gateway,
            ledger,
            config: Arc::new(config),
            health,
        }
    }
}

pub fn routes(state: AlfalahState) -> Router {
    Router::new()
        .route("/api/alfa/pay", post(pay))
        .route("/api/alfa/create-payment", post(create_payment))
        .route("/api/alfa/listener", post(listener))
        .route("/api/alfa/return", get(payment_return).post(payment_return))
        .route("/api/alfa/check-payment-status", post(check_payment_status))
        .route("/api/alfa/ipn-status", post(ipn_status))
        .route("/api/alfa/cache/{transaction_id}", get(cache_entry))
        .route("/api/alfa/test", get(probe))
        .route("/health", get(health))
        .with_state(state)
}

fn tagged(err: impl Into<AppError>, request_id: &Option<String>) -> AppError {
    let err = err.into();
    match request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    }
}

fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false)
}

fn invalid_body(reason: impl Into<String>) -> AppError {
    AppError::new(AppErrorKind::Validation(ValidationError::InvalidField {
        field: "body".to_string(),
        reason: reason.into(),
    }))
}

/// Reads a request body as a JSON object. Form-encoded bodies become an
/// object of string values.
fn request_body(headers: &HeaderMap, body: &Bytes) -> AppResult<JsonValue> {
    if is_json_request(headers) {
        return match serde_json::from_slice::<JsonValue>(body) {
            Ok(value @ JsonValue::Object(_)) => Ok(value),
            Ok(_) => Err(invalid_body("expected a JSON object")),
            Err(e) => Err(invalid_body(e.to_string())),
        };
    }

    let fields: serde_json::Map<String, JsonValue> = url::form_urlencoded::parse(body)
        .into_owned()
        .map(|(key, value)| (key, JsonValue::String(value)))
        .collect();
    Ok(JsonValue::Object(fields))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_amount(raw: &JsonValue) -> AppResult<Amount> {
    Amount::from_json(raw).map_err(|e| {
        let amount = match raw {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        AppError::new(AppErrorKind::Validation(ValidationError::InvalidAmount {
            amount,
            reason: e.user_message(),
        }))
    })
}

/// POST /api/alfa/pay
///
/// Direct page-redirect flow: returns the `HS_*` fields the browser posts to
/// the gateway.
pub async fn pay(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let body = request_body(&headers, &body).map_err(|e| tagged(e, &request_id))?;

    let transaction_id = non_empty(json_field_str(&body, "transactionId"));
    let raw_amount = body.get("amount").filter(|v| !v.is_null());
    let (Some(transaction_id), Some(raw_amount)) = (transaction_id, raw_amount) else {
        return Err(tagged(
            AppError::missing_field("transactionId and amount"),
            &request_id,
        ));
    };
    let amount = parse_amount(raw_amount).map_err(|e| tagged(e, &request_id))?;

    let customer = CustomerContact {
        email: non_empty(json_field_str(&body, "customerEmail")),
        name: non_empty(json_field_str(&body, "customerName")),
        mobile: non_empty(json_field_str(&body, "customerMobile")),
    };
    let request = PaymentRequest {
        transaction_id: transaction_id.clone(),
        amount,
        customer: customer.clone(),
        transaction_type: non_empty(json_field_str(&body, "transactionType")),
        is_redirection_request: non_empty(json_field_str(&body, "isRedirectionRequest")),
    };

    info!(
        transaction_id = %transaction_id,
        amount = %amount,
        gateway = state.gateway.name(),
        "payment request received"
    );

    let response = state
        .gateway
        .initiate_payment(&request)
        .map_err(|e| tagged(e, &request_id))?;

    state
        .ledger
        .create(
            &transaction_id,
            NewTransaction {
                amount: amount.to_string(),
                customer,
                payment_type: response
                    .payment_fields
                    .get("HS_TransactionTypeId")
                    .map(str::to_string),
                auth_token: None,
            },
        )
        .await
        .map_err(|e| tagged(e, &request_id))?;

    info!(transaction_id = %transaction_id, "payment initiated");
    Ok(success_response(response, "Payment initiated successfully"))
}

/// POST /api/alfa/create-payment
///
/// Handshake + SSO flow under a generated `ORD-<millis>` order id.
pub async fn create_payment(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let body = request_body(&headers, &body).map_err(|e| tagged(e, &request_id))?;

    let raw_amount = body.get("amount").filter(|v| !v.is_null());
    let raw_type = non_empty(json_field_str(&body, "type"));
    let (Some(raw_amount), Some(raw_type)) = (raw_amount, raw_type) else {
        return Err(tagged(AppError::missing_field("amount and type"), &request_id));
    };
    let amount = parse_amount(raw_amount).map_err(|e| tagged(e, &request_id))?;
    let payment_type = TransactionType::from_str(&raw_type).map_err(|e| tagged(e, &request_id))?;

    let order_id = format!("ORD-{}", Utc::now().timestamp_millis());
    info!(order_id = %order_id, payment_type = payment_type.label(), "new order initiated");

    let handshake = state
        .gateway
        .handshake(&order_id)
        .await
        .map_err(|e| tagged(e, &request_id).with_context(format!("order {}", order_id)))?;

    let redirect_form = state
        .gateway
        .build_redirect_form(&handshake.auth_token, &order_id, &amount, payment_type)
        .map_err(|e| tagged(e, &request_id))?;

    state
        .ledger
        .create(
            &order_id,
            NewTransaction {
                amount: amount.to_string(),
                customer: CustomerContact::default(),
                payment_type: Some(payment_type.type_id().to_string()),
                auth_token: Some(handshake.auth_token.clone()),
            },
        )
        .await
        .map_err(|e| tagged(e, &request_id))?;

    Ok(Json(json!({
        "success": true,
        "orderId": order_id,
        "paymentType": payment_type.label(),
        "redirectForm": redirect_form,
    })))
}

/// Reads a callback body as a flat string map, JSON or form-encoded.
fn parse_callback_body(headers: &HeaderMap, body: &Bytes) -> HashMap<String, String> {
    if body.is_empty() {
        return HashMap::new();
    }

    if is_json_request(headers) {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(JsonValue::Object(map)) => map
                .iter()
                .filter_map(|(key, value)| json_scalar_str(value).map(|v| (key.clone(), v)))
                .collect(),
            Ok(_) | Err(_) => {
                warn!("callback body is not a JSON object");
                HashMap::new()
            }
        }
    } else {
        url::form_urlencoded::parse(body).into_owned().collect()
    }
}

fn is_success_code(code: Option<&str>) -> bool {
    matches!(code, Some("00") | Some("000"))
}

/// POST /api/alfa/listener
///
/// Gateway webhook. Always answers `200 {"message": "Received"}`.
pub async fn listener(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = parse_callback_body(&headers, &body);
    info!(
        fields = ?params.keys().collect::<Vec<_>>(),
        "payment listener called"
    );

    if let Err(e) = record_listener_result(&state, &params).await {
        error!(error = %e, "listener processing failed");
    }

    (StatusCode::OK, Json(json!({ "message": "Received" }))).into_response()
}

async fn record_listener_result(
    state: &AlfalahState,
    params: &HashMap<String, String>,
) -> AppResult<()> {
    let Some(request_hash) = non_empty(params.get("RequestHash").cloned()) else {
        warn!("listener called without RequestHash");
        return Ok(());
    };

    let decrypted = match state.gateway.decrypt_callback(&request_hash) {
        Ok(decrypted) => decrypted,
        Err(e) => {
            error!(error = %e, "failed to decrypt listener RequestHash");
            return Ok(());
        }
    };

    let response_code = non_empty(params.get("ResponseCode").cloned());
    let response_message = non_empty(params.get("ResponseMessage").cloned());
    let Some(transaction_id) = non_empty(params.get("HS_TransactionReferenceNumber").cloned())
        .or_else(|| transaction_id_from_payload(&decrypted))
    else {
        warn!("listener payload carries no transaction reference");
        return Ok(());
    };

    let state_reported = if is_success_code(response_code.as_deref()) {
        PaymentState::Success
    } else {
        PaymentState::Failed
    };
    info!(
        transaction_id = %transaction_id,
        response_code = ?response_code,
        status = %state_reported,
        "listener result received"
    );

    let outcome = Outcome::new(state_reported, OutcomeSource::Listener)
        .with_response(response_code, response_message)
        .with_decrypted_data(Some(decrypted));
    state.ledger.apply_result(&transaction_id, outcome).await?;
    Ok(())
}

fn transaction_id_from_payload(decrypted: &str) -> Option<String> {
    let fields = split_fields(decrypted);
    if fields.len() > PaymentInitiationFields::TRANSACTION_ID_INDEX {
        non_empty(Some(
            fields[PaymentInitiationFields::TRANSACTION_ID_INDEX].clone(),
        ))
    } else {
        None
    }
}

/// Return-URL parameters after alias resolution
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ReturnParams {
    success: Option<String>,
    auth_token: Option<String>,
    transaction_id: Option<String>,
    error_message: Option<String>,
    response_code: Option<String>,
    response_message: Option<String>,
    request_hash: Option<String>,
}

impl ReturnParams {
    fn from_map(data: &HashMap<String, String>) -> Self {
        let pick = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| non_empty(data.get(*alias).cloned()))
        };

        Self {
            success: pick(&["success", "Success"]),
            auth_token: pick(&["AuthToken", "authToken", "auth_token"]),
            transaction_id: pick(&["transaction_id", "TransactionId", "HS_TransactionReferenceNumber"]),
            error_message: pick(&["ErrorMessage", "errorMessage", "error_message"]),
            response_code: pick(&["ResponseCode", "response_code"]),
            response_message: pick(&["ResponseMessage", "response_message"]),
            request_hash: pick(&["RequestHash", "request_hash"]),
        }
    }

    fn is_success(&self) -> bool {
        self.success.as_deref() == Some("true") || is_success_code(self.response_code.as_deref())
    }
}

/// Builds `{frontend}/payment-return?...` for the browser.
fn frontend_redirect(frontend_url: &str, params: &ReturnParams, success: bool) -> String {
    let base = format!("{}/payment-return", frontend_url.trim_end_matches('/'));
    let order_id = params.transaction_id.clone().unwrap_or_default();

    let mut pairs: Vec<(&str, String)> = vec![
        ("status", if success { "success" } else { "failed" }.to_string()),
        ("O", order_id),
    ];
    if success {
        pairs.push(("token", params.auth_token.clone().unwrap_or_default()));
    } else {
        pairs.push((
            "msg",
            params
                .error_message
                .clone()
                .or_else(|| params.response_message.clone())
                .unwrap_or_else(|| "Payment failed".to_string()),
        ));
    }

    match url::Url::parse_with_params(&base, &pairs) {
        Ok(url) => url.to_string(),
        Err(e) => {
            error!(error = %e, frontend_url = %frontend_url, "invalid frontend URL");
            base
        }
    }
}

/// GET|POST /api/alfa/return
///
/// Browser return from the gateway. Query and body are merged (body wins)
/// and the customer is sent on to the front end with `303 See Other`.
pub async fn payment_return(
    State(state): State<AlfalahState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Redirect {
    let mut data = query;
    data.extend(parse_callback_body(&headers, &body));

    let mut params = ReturnParams::from_map(&data);
    let success = params.is_success();
    info!(
        transaction_id = ?params.transaction_id,
        response_code = ?params.response_code,
        success,
        "payment return received"
    );

    let decrypted = params.request_hash.as_deref().and_then(|hash| {
        state
            .gateway
            .decrypt_callback(hash)
            .map_err(|e| warn!(error = %e, "failed to decrypt return RequestHash"))
            .ok()
    });

    if params.transaction_id.is_none() {
        params.transaction_id = decrypted.as_deref().and_then(transaction_id_from_payload);
    }

    if let Some(transaction_id) = params.transaction_id.as_deref() {
        let outcome = Outcome::new(
            if success {
                PaymentState::Success
            } else {
                PaymentState::Failed
            },
            OutcomeSource::Return,
        )
        .with_response(
            params.response_code.clone(),
            params
                .response_message
                .clone()
                .or_else(|| params.error_message.clone()),
        )
        .with_auth_token(params.auth_token.clone())
        .with_decrypted_data(decrypted);

        if let Err(e) = state.ledger.apply_result(transaction_id, outcome).await {
            error!(error = %e, transaction_id = %transaction_id, "failed to record return");
        }
    }

    let target = frontend_redirect(&state.config.frontend_url, &params, success);
    info!(target = %target, "redirecting customer");
    Redirect::to(&target)
}

/// Ledger view returned by `/check-payment-status`
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionStatusView {
    pub transaction_id: String,
    pub transaction_reference_number: String,
    pub transaction_amount: String,
    pub transaction_date_time: String,
    pub status: String,
    pub response_code: Option<String>,
    pub response_message: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub auth_token: Option<String>,
}

impl From<TransactionRecord> for TransactionStatusView {
    fn from(record: TransactionRecord) -> Self {
        Self {
            transaction_reference_number: record.transaction_id.clone(),
            transaction_id: record.transaction_id,
            transaction_amount: record.amount,
            transaction_date_time: record.paid_at.unwrap_or(record.created_at).to_rfc3339(),
            status: record.status.as_str().to_uppercase(),
            response_code: record.response_code,
            response_message: record.response_message,
            customer_email: record.customer_email,
            customer_name: record.customer_name,
            customer_mobile: record.customer_mobile,
            auth_token: record.auth_token,
        }
    }
}

fn required_order_id(
    headers: &HeaderMap,
    body: &Bytes,
    request_id: &Option<String>,
) -> AppResult<String> {
    let body = request_body(headers, body).map_err(|e| tagged(e, request_id))?;
    non_empty(json_field_str(&body, "orderId"))
        .ok_or_else(|| tagged(AppError::missing_field("orderId"), request_id))
}

/// POST /api/alfa/check-payment-status
pub async fn check_payment_status(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let order_id = required_order_id(&headers, &body, &request_id)?;

    let record = state
        .ledger
        .get(&order_id)
        .await
        .map_err(|e| tagged(e, &request_id))?
        .ok_or_else(|| tagged(AppError::not_found(order_id.clone()), &request_id))?;

    info!(order_id = %order_id, status = %record.status, "transaction found");
    Ok(Json(json!({
        "success": true,
        "transactionStatus": TransactionStatusView::from(record),
        "message": "Payment status retrieved successfully",
    })))
}

/// POST /api/alfa/ipn-status
///
/// Asks the gateway for the order's status and records the answer.
pub async fn ipn_status(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let order_id = required_order_id(&headers, &body, &request_id)?;

    let status = state
        .gateway
        .query_status(&order_id)
        .await
        .map_err(|e| tagged(e, &request_id))?;
    let paid = status.is_paid();

    let outcome = Outcome::new(status.state(), OutcomeSource::StatusQuery).with_response(
        status.response_code.clone(),
        status
            .description
            .clone()
            .or_else(|| status.transaction_status.clone()),
    );
    state
        .ledger
        .apply_result(&order_id, outcome)
        .await
        .map_err(|e| tagged(e, &request_id))?;

    let message = if paid {
        "Transaction Successful".to_string()
    } else {
        status
            .description
            .clone()
            .unwrap_or_else(|| "Transaction Failed".to_string())
    };

    Ok(Json(json!({
        "success": paid,
        "message": message,
        "transactionStatus": status.raw,
    })))
}

/// GET /api/alfa/cache/{transaction_id}
pub async fn cache_entry(
    State(state): State<AlfalahState>,
    headers: HeaderMap,
    Path(transaction_id): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let record = state
        .ledger
        .get(&transaction_id)
        .await
        .map_err(|e| tagged(e, &request_id))?
        .ok_or_else(|| tagged(AppError::not_found(transaction_id.clone()), &request_id))?;

    Ok(Json(json!({ "success": true, "data": record })))
}

/// GET /api/alfa/test
pub async fn probe(State(state): State<AlfalahState>) -> Json<JsonValue> {
    let cache_size = match state.ledger.len().await {
        Ok(size) => size,
        Err(e) => {
            warn!(error = %e, "ledger size unavailable");
            0
        }
    };

    Json(json!({
        "success": true,
        "message": "Bank Alfalah API Running",
        "config": config_presence(&state.config),
        "cacheSize": cache_size,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /health
pub async fn health(State(state): State<AlfalahState>) -> Response {
    let status = state.health.check_health().await;
    let code = if status.status == HealthState::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status)).into_response()
}
