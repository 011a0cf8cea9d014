use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::{
    dto::cart::{AddToCartRequest, CartItemDto, CartView, RemoveFromCartRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cart", get(view_cart))
        .route("/add-to-cart", post(add_to_cart))
        .route("/remove-from-cart", post(remove_from_cart))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current active cart with line and cart totals", body = ApiResponse<CartView>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn view_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartView>>> {
    let response = cart_service::view_cart(&state, &user).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/add-to-cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Item added or quantity accumulated", body = ApiResponse<CartItemDto>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItemDto>>> {
    let response = cart_service::add_to_cart(&state, &user, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/api/remove-from-cart",
    request_body = RemoveFromCartRequest,
    responses(
        (status = 200, description = "One unit removed, item deleted on the last one", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "No active cart or no matching item"),
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RemoveFromCartRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = cart_service::remove_from_cart(&state, &user, payload).await?;
    Ok(Json(response))
}
