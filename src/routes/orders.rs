use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, OrderDto, OrderList, UpdateOrderRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}", put(update_order))
        .route("/{id}", axum::routing::delete(delete_order))
}

// Order creation is the cart-completion transition, so it lives at
// /create-order rather than as a generic POST on the collection.
pub fn create_order_route() -> Router<AppState> {
    Router::new().route("/create-order", post(create_order))
}

#[utoipa::path(
    post,
    path = "/api/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created from the active cart", body = ApiResponse<OrderDto>),
        (status = 400, description = "Delivery date or time missing"),
        (status = 404, description = "No active cart"),
        (status = 409, description = "Cart already has an order"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<OrderDto>>)> {
    let response = order_service::place_order(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("sort_order" = Option<String>, Query, description = "asc or desc by ordered_at")
    ),
    responses(
        (status = 200, description = "List the caller's orders", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let response = order_service::list_orders(&state, &user, query).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get order with computed total", body = ApiResponse<OrderDto>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderDto>>> {
    let response = order_service::get_order(&state, &user, id).await?;
    Ok(Json(response))
}

#[utoipa::path(
    put,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Updated delivery fields", body = ApiResponse<OrderDto>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> AppResult<Json<ApiResponse<OrderDto>>> {
    let response = order_service::update_order(&state, &user, id, payload).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Order not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let response = order_service::delete_order(&state, &user, id).await?;
    Ok(Json(response))
}
