use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CreateOrderRequest, OrderDto, OrderList, UpdateOrderRequest},
    entity::{
        orders::{self, Column as OrderCol, Entity as Orders},
        shopping_carts,
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::{self, CartStatus},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::cart_service,
    state::AppState,
};

/// Convert the caller's active cart into an order.
///
/// The order insert and the cart's `active -> completed` transition commit
/// together or not at all; a crash in between must leave the cart active.
/// The unique constraint on `orders.cart_id` turns a concurrent double
/// placement into a conflict instead of a second order.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    let (Some(delivery_date), Some(delivery_time)) = (payload.delivery_date, payload.delivery_time)
    else {
        return Err(AppError::BadRequest(
            "Delivery date and time are required".to_string(),
        ));
    };

    let txn = state.orm.begin().await?;

    let cart = cart_service::active_cart_for_update(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let lines = cart_service::cart_lines(&txn, cart.id).await?;
    let total = models::cart_total(&lines);

    let order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        cart_id: Set(cart.id),
        user_id: Set(user.user_id),
        ordered_at: NotSet,
        delivery_date: Set(delivery_date),
        delivery_time: Set(delivery_time),
    }
    .insert(&txn)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Conflict("cart already has an order".to_string())
        } else {
            AppError::from(err)
        }
    })?;

    let mut active: shopping_carts::ActiveModel = cart.into();
    active.status = Set(CartStatus::Completed.as_str().to_string());
    active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_create",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id, "cart_id": order.cart_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Order created",
        order_to_dto(order, total),
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::OrderedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::OrderedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(orders.len());
    for order in orders {
        let total_price = order_total(&state.orm, order.cart_id).await?;
        items.push(order_to_dto(order, total_price));
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderDto>> {
    let order = find_owned(state, user, id).await?;
    let total = order_total(&state.orm, order.cart_id).await?;
    Ok(ApiResponse::success(
        "OK",
        order_to_dto(order, total),
        Some(Meta::empty()),
    ))
}

/// The generic update endpoint: delivery date and time are the only mutable
/// fields of an order.
pub async fn update_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderRequest,
) -> AppResult<ApiResponse<OrderDto>> {
    let order = find_owned(state, user, id).await?;

    let mut active: orders::ActiveModel = order.into();
    if let Some(delivery_date) = payload.delivery_date {
        active.delivery_date = Set(delivery_date);
    }
    if let Some(delivery_time) = payload.delivery_time {
        active.delivery_time = Set(delivery_time);
    }
    let order = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_update",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let total = order_total(&state.orm, order.cart_id).await?;
    Ok(ApiResponse::success(
        "Updated",
        order_to_dto(order, total),
        Some(Meta::empty()),
    ))
}

/// Deletes the order record. The cart it came from stays `completed`;
/// completed carts never reopen.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Orders::delete_many()
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_delete",
        Some("orders"),
        Some(serde_json::json!({ "order_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<orders::Model> {
    Orders::find()
        .filter(OrderCol::Id.eq(id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn order_total<C: ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<Decimal> {
    let lines = cart_service::cart_lines(conn, cart_id).await?;
    Ok(models::cart_total(&lines))
}

fn order_to_dto(model: orders::Model, total_order_price: Decimal) -> OrderDto {
    OrderDto {
        id: model.id,
        cart: model.cart_id,
        user: model.user_id,
        ordered_at: model.ordered_at.with_timezone(&Utc),
        delivery_date: model.delivery_date,
        delivery_time: model.delivery_time,
        total_order_price,
    }
}
