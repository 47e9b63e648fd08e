//! VNPay callback handlers
use std::collections::HashMap;

use axum::extract::{Query, RawQuery, State};
use axum::Json;
use url::form_urlencoded;

use crate::api::dto::{ApiResponse, PaymentResultView};
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::payment::IpnReply;

/// Browser return after the customer leaves the gateway.
pub async fn vnpay_return(
    State(s): State<AppState>, Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<PaymentResultView>>, ApiError> {
    let outcome = s.payments.handle_callback(&params).await?;
    let message = if outcome.approved { "Payment successful" } else { "Payment failed" };
    let view = PaymentResultView {
        order_id: outcome.order.id(),
        approved: outcome.approved,
        payment_status: outcome.order.payment_status(),
        status: outcome.order.status(),
        warning: outcome.warning,
    };
    Ok(Json(ApiResponse::ok(message, view)))
}

/// Server-to-server notification. The gateway expects HTTP 200 with a
/// response code in the body, whatever the outcome, so the query is parsed
/// here rather than by an extractor that could reject it.
pub async fn vnpay_ipn(State(s): State<AppState>, RawQuery(query): RawQuery) -> Json<IpnReply> {
    let params = callback_params(query.as_deref().unwrap_or(""));
    Json(match s.payments.handle_callback(&params).await {
        Ok(outcome) => outcome.ipn_reply(),
        Err(e) => IpnReply::from_error(&e),
    })
}

/// Lossy form decoding; a repeated key keeps its last value.
fn callback_params(query: &str) -> HashMap<String, String> {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}
