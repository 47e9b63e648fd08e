//! Order handlers
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use validator::Validate;

use crate::api::dto::{
    ApiResponse, CheckoutView, CreateOrderRequest, MyOrdersQuery, OrderListQuery, OrderView, PaymentStatusRequest,
    StatsView, StatusRequest,
};
use crate::api::error::ApiError;
use crate::api::extract::ClientIp;
use crate::api::AppState;
use crate::domain::aggregates::{CustomerContext, OrderStatus, PaymentStatus};
use crate::services::order::StatusChange;
use crate::services::CheckoutOutcome;
use crate::store::{Page, PageRequest};

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub async fn create_order(
    State(s): State<AppState>, caller: CustomerContext, ClientIp(ip): ClientIp, Json(r): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CheckoutView>>), ApiError> {
    r.validate()?;
    let request = r.into_checkout()?;
    let view = match s.orders.create_order(&caller, &request, &ip).await? {
        CheckoutOutcome::Placed { order, warning } => {
            CheckoutView { order_id: order.id(), order: Some(OrderView::from(&order)), payment_url: None, warning }
        }
        CheckoutOutcome::Redirect { order, payment_url } => {
            CheckoutView { order_id: order.id(), order: None, payment_url: Some(payment_url), warning: None }
        }
    };
    Ok((StatusCode::CREATED, Json(ApiResponse::new(201, "Order created", view))))
}

pub async fn my_orders(
    State(s): State<AppState>, caller: CustomerContext, Query(q): Query<MyOrdersQuery>,
) -> ApiResult<Page<OrderView>> {
    let page = s.orders.my_orders(&caller, q.status()?, PageRequest::new(q.page, q.per_page)).await?;
    Ok(Json(ApiResponse::ok("Orders retrieved", page.map(|o| OrderView::from(&o)))))
}

pub async fn list_orders(
    State(s): State<AppState>, caller: CustomerContext, Query(q): Query<OrderListQuery>,
) -> ApiResult<Page<OrderView>> {
    q.validate()?;
    let page = s.orders.list_orders(&caller, &q.filter()?, q.page()).await?;
    Ok(Json(ApiResponse::ok("Orders retrieved", page.map(|o| OrderView::from(&o)))))
}

pub async fn get_order(State(s): State<AppState>, caller: CustomerContext, Path(id): Path<Uuid>) -> ApiResult<OrderView> {
    let order = s.orders.order_detail(&caller, id).await?;
    Ok(Json(ApiResponse::ok("Order retrieved", OrderView::from(&order))))
}

pub async fn change_status(
    State(s): State<AppState>, caller: CustomerContext, Path(id): Path<Uuid>, Json(r): Json<StatusRequest>,
) -> ApiResult<StatusChange> {
    let status = r.status.parse::<OrderStatus>()?;
    Ok(Json(ApiResponse::ok("Order status updated", s.orders.change_status(&caller, id, status).await?)))
}

pub async fn change_payment_status(
    State(s): State<AppState>, caller: CustomerContext, Path(id): Path<Uuid>, Json(r): Json<PaymentStatusRequest>,
) -> ApiResult<StatusChange> {
    let status = r.payment_status.parse::<PaymentStatus>()?;
    Ok(Json(ApiResponse::ok("Payment status updated", s.orders.change_payment_status(&caller, id, status).await?)))
}

pub async fn cancel_order(State(s): State<AppState>, caller: CustomerContext, Path(id): Path<Uuid>) -> ApiResult<StatusChange> {
    Ok(Json(ApiResponse::ok("Order cancelled", s.orders.cancel_order(&caller, id).await?)))
}

pub async fn order_stats(State(s): State<AppState>, caller: CustomerContext) -> ApiResult<StatsView> {
    let stats = s.orders.order_stats(&caller).await?;
    Ok(Json(ApiResponse::ok("Statistics retrieved", StatsView::from(&stats))))
}
