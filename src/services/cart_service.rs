use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartLineDto, CartView, RemoveFromCartRequest},
    entity::{
        cart_items::{self, Column as CartItemCol, Entity as CartItems},
        products::Entity as Products,
        shopping_carts::{self, Column as CartCol, Entity as ShoppingCarts},
    },
    error::{AppError, AppResult, is_unique_violation},
    middleware::auth::AuthUser,
    models::{self, CartLine, CartStatus},
    response::{ApiResponse, Meta},
    services::product_service::product_from_entity,
    state::AppState,
};

/// Add a product to the caller's active cart, creating the cart when absent
/// and accumulating quantity when the product is already in it.
///
/// Cart and item resolution run inside one transaction with row locks; a
/// unique-constraint conflict from a concurrent request for the same user is
/// retried once against the row the other request created.
pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItemDto>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let mut attempt = 0;
    let item = loop {
        attempt += 1;
        match add_item_in_txn(state, user.user_id, &payload).await {
            Err(AppError::OrmError(err)) if is_unique_violation(&err) => {
                if attempt == 1 {
                    tracing::debug!(user_id = %user.user_id, "concurrent cart write, retrying");
                    continue;
                }
                return Err(AppError::Conflict(
                    "cart is being updated concurrently".to_string(),
                ));
            }
            result => break result?,
        }
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("OK", cart_item_to_dto(item), None))
}

async fn add_item_in_txn(
    state: &AppState,
    user_id: Uuid,
    payload: &AddToCartRequest,
) -> AppResult<cart_items::Model> {
    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(payload.product_id).one(&txn).await?;
    if product.is_none() {
        return Err(AppError::NotFound);
    }

    let cart = match active_cart_for_update(&txn, user_id).await? {
        Some(cart) => cart,
        None => {
            shopping_carts::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                status: Set(CartStatus::Active.as_str().to_string()),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?
        }
    };

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(payload.product_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let item = match existing {
        Some(item) => {
            let quantity = item.quantity + payload.quantity;
            let mut active: cart_items::ActiveModel = item.into();
            active.quantity = Set(quantity);
            active.update(&txn).await?
        }
        None => {
            cart_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(payload.product_id),
                quantity: Set(payload.quantity),
                added_at: NotSet,
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;
    Ok(item)
}

/// Remove one unit of a product from the caller's active cart. Quantity
/// above one is decremented; the last unit deletes the item row, so a
/// quantity of zero is never persisted. Completed carts are immutable and
/// never resolved here.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    payload: RemoveFromCartRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let cart = active_cart_for_update(&txn, user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let item = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(payload.product_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if item.quantity > 1 {
        let quantity = item.quantity - 1;
        let mut active: cart_items::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.update(&txn).await?;
    } else {
        item.delete(&txn).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_remove",
        Some("cart_items"),
        Some(serde_json::json!({ "product_id": payload.product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Item removed",
        serde_json::json!({ "status": "Item removed" }),
        Some(Meta::empty()),
    ))
}

/// Current active cart with items, per-line totals and the cart total.
/// Returns an empty view when the caller has no active cart.
pub async fn view_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let cart = ShoppingCarts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::Status.eq(CartStatus::Active.as_str()))
        .order_by_desc(CartCol::CreatedAt)
        .one(&state.orm)
        .await?;

    let Some(cart) = cart else {
        let view = CartView {
            cart_id: None,
            status: None,
            items: Vec::new(),
            total_price: rust_decimal::Decimal::ZERO,
        };
        return Ok(ApiResponse::success("Cart is empty", view, None));
    };

    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut lines: Vec<CartLine> = Vec::with_capacity(rows.len());
    let mut items: Vec<CartLineDto> = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        if product.is_none() {
            tracing::warn!(
                cart_id = %cart.id,
                product_id = %item.product_id,
                "cart item references a missing product, counting it as zero"
            );
        }
        let line = CartLine {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: product.as_ref().map(|p| p.price),
        };
        items.push(CartLineDto {
            product_id: item.product_id,
            product: product.map(product_from_entity),
            quantity: item.quantity,
            line_total: line
                .unit_price
                .map(|price| models::line_total(line.quantity, price))
                .unwrap_or_default(),
        });
        lines.push(line);
    }

    let view = CartView {
        cart_id: Some(cart.id),
        status: cart.status.parse::<CartStatus>().ok(),
        total_price: models::cart_total(&lines),
        items,
    };

    Ok(ApiResponse::success("OK", view, None))
}

/// Resolve the user's most recently created active cart, locking the row
/// for the rest of the transaction.
pub(crate) async fn active_cart_for_update<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<Option<shopping_carts::Model>, sea_orm::DbErr> {
    ShoppingCarts::find()
        .filter(CartCol::UserId.eq(user_id))
        .filter(CartCol::Status.eq(CartStatus::Active.as_str()))
        .order_by_desc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .one(conn)
        .await
}

/// Pricing inputs for every item in a cart. Items whose product is gone get
/// `unit_price: None` and a warning, not an error.
pub(crate) async fn cart_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> AppResult<Vec<CartLine>> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .find_also_related(Products)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(item, product)| {
            if product.is_none() {
                tracing::warn!(
                    cart_id = %cart_id,
                    product_id = %item.product_id,
                    "cart item references a missing product, counting it as zero"
                );
            }
            CartLine {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: product.map(|p| p.price),
            }
        })
        .collect())
}

fn cart_item_to_dto(item: cart_items::Model) -> CartItemDto {
    CartItemDto {
        id: item.id,
        cart: item.cart_id,
        product: item.product_id,
        quantity: item.quantity,
    }
}
