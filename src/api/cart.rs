//! Cart handlers
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::dto::{AddItemRequest, ApiResponse, CartView, QuantityRequest, SelectionRequest};
use crate::api::error::ApiError;
use crate::api::AppState;
use crate::domain::aggregates::CustomerContext;

type CartResponse = Result<Json<ApiResponse<CartView>>, ApiError>;

fn view(message: &str, cart: &crate::domain::aggregates::Cart) -> Json<ApiResponse<CartView>> {
    Json(ApiResponse::ok(message, CartView::from(cart)))
}

pub async fn create_cart(
    State(s): State<AppState>, caller: CustomerContext,
) -> Result<(StatusCode, Json<ApiResponse<CartView>>), ApiError> {
    let cart = s.carts.create_cart(caller.user_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(201, "Cart created", CartView::from(&cart)))))
}

pub async fn get_cart(State(s): State<AppState>, caller: CustomerContext) -> CartResponse {
    Ok(view("Cart retrieved", &s.carts.get_cart(&caller).await?))
}

pub async fn add_item(State(s): State<AppState>, caller: CustomerContext, Json(r): Json<AddItemRequest>) -> CartResponse {
    Ok(view("Item added to cart", &s.carts.add_item(&caller, r.product_id, r.quantity).await?))
}

pub async fn update_quantity(
    State(s): State<AppState>, caller: CustomerContext, Path(item_id): Path<Uuid>, Json(r): Json<QuantityRequest>,
) -> CartResponse {
    Ok(view("Quantity updated", &s.carts.update_quantity(&caller, item_id, r.quantity).await?))
}

pub async fn set_selection(
    State(s): State<AppState>, caller: CustomerContext, Path(item_id): Path<Uuid>, Json(r): Json<SelectionRequest>,
) -> CartResponse {
    Ok(view("Selection updated", &s.carts.set_selection(&caller, item_id, r.selected).await?))
}

pub async fn select_all(State(s): State<AppState>, caller: CustomerContext, Json(r): Json<SelectionRequest>) -> CartResponse {
    Ok(view("Selection updated", &s.carts.select_all(&caller, r.selected).await?))
}

pub async fn remove_item(State(s): State<AppState>, caller: CustomerContext, Path(item_id): Path<Uuid>) -> CartResponse {
    Ok(view("Item removed", &s.carts.remove_item(&caller, item_id).await?))
}

pub async fn clear_cart(State(s): State<AppState>, caller: CustomerContext) -> CartResponse {
    Ok(view("Cart cleared", &s.carts.clear(&caller).await?))
}

pub async fn checkout_items(State(s): State<AppState>, caller: CustomerContext) -> CartResponse {
    Ok(view("Selected items retrieved", &s.carts.checkout_items(&caller).await?))
}

pub async fn item_count(State(s): State<AppState>, caller: CustomerContext) -> Result<Json<ApiResponse<u64>>, ApiError> {
    Ok(Json(ApiResponse::ok("Item count retrieved", s.carts.item_count(&caller).await?)))
}
