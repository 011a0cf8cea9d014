use std::str::FromStr;

use autocompany_api::{
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::{AddToCartRequest, RemoveFromCartRequest},
        orders::CreateOrderRequest,
        products::CreateProductRequest,
    },
    entity::{
        orders::ActiveModel as OrderActive,
        products::ActiveModel as ProductActive,
        shopping_carts::Entity as ShoppingCarts,
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::OrderListQuery,
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: add to cart accumulates, remove decrements, totals are
// computed from line prices, and order placement completes the cart
// atomically.
#[tokio::test]
async fn cart_to_order_flow() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let user_id = create_user(&state, "user", "flow-user@example.com").await?;
    let user = AuthUser {
        user_id,
        role: "user".into(),
    };

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test Widget".into()),
        description: Set(Some("A product for testing".into())),
        price: Set(Decimal::from_str("25.99")?),
        stock_quantity: Set(10),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // Removing from a cart that does not exist yet fails NotFound.
    let err = cart_service::remove_from_cart(
        &state,
        &user,
        RemoveFromCartRequest {
            product_id: product.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Adding an unknown product fails NotFound.
    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: Uuid::new_v4(),
            quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Zero quantity is rejected.
    let err = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // First add creates the cart and the item.
    let added = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 2,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(added.quantity, 2);

    // Second add for the same product accumulates instead of duplicating.
    let added_again = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 3,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(added_again.id, added.id);
    assert_eq!(added_again.quantity, 5);

    let view = cart_service::view_cart(&state, &user).await?.data.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.total_price, Decimal::from_str("129.95")?);

    // Remove decrements by one while quantity is above one.
    cart_service::remove_from_cart(
        &state,
        &user,
        RemoveFromCartRequest {
            product_id: product.id,
        },
    )
    .await?;

    let view = cart_service::view_cart(&state, &user).await?.data.unwrap();
    assert_eq!(view.items[0].quantity, 4);
    assert_eq!(view.total_price, Decimal::from_str("103.96")?);

    // Missing delivery info is rejected before anything is written.
    let err = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            delivery_date: Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            delivery_time: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Placing the order reports the cart total and completes the cart.
    let order = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            delivery_date: Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            delivery_time: Some(NaiveTime::from_hms_opt(14, 0, 0).unwrap()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(order.total_order_price, Decimal::from_str("103.96")?);
    assert_eq!(order.user, user_id);

    let cart = ShoppingCarts::find_by_id(order.cart)
        .one(&state.orm)
        .await?
        .expect("ordered cart");
    assert_eq!(cart.status, "completed");

    // The completed cart is immutable: no further removals resolve it.
    let err = cart_service::remove_from_cart(
        &state,
        &user,
        RemoveFromCartRequest {
            product_id: product.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // A second placement finds no active cart and creates no order.
    let err = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            delivery_date: Some(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()),
            delivery_time: Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    let orders = order_service::list_orders(
        &state,
        &user,
        OrderListQuery {
            page: Some(1),
            per_page: Some(20),
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(orders.items.len(), 1);

    // Adding after completion opens a fresh active cart.
    let fresh = cart_service::add_to_cart(
        &state,
        &user,
        AddToCartRequest {
            product_id: product.id,
            quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_ne!(fresh.cart, order.cart);
    assert_eq!(fresh.quantity, 1);

    // A competing placement that already claimed the cart turns a second
    // one into a conflict, and the aborted transaction leaves the cart
    // active with its items intact.
    OrderActive {
        id: Set(Uuid::new_v4()),
        cart_id: Set(fresh.cart),
        user_id: Set(user_id),
        ordered_at: NotSet,
        delivery_date: Set(NaiveDate::from_ymd_opt(2026, 10, 1).unwrap()),
        delivery_time: Set(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
    }
    .insert(&state.orm)
    .await?;
    let err = order_service::place_order(
        &state,
        &user,
        CreateOrderRequest {
            delivery_date: Some(NaiveDate::from_ymd_opt(2026, 10, 2).unwrap()),
            delivery_time: Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let cart_row = ShoppingCarts::find_by_id(fresh.cart)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(cart_row.status, "active");
    let view = cart_service::view_cart(&state, &user).await?.data.unwrap();
    assert_eq!(view.items.len(), 1);

    // Removing the last unit deletes the row rather than keeping quantity 0.
    cart_service::remove_from_cart(
        &state,
        &user,
        RemoveFromCartRequest {
            product_id: product.id,
        },
    )
    .await?;
    let view = cart_service::view_cart(&state, &user).await?.data.unwrap();
    assert!(view.items.is_empty());
    assert_eq!(view.total_price, Decimal::ZERO);

    let err = cart_service::remove_from_cart(
        &state,
        &user,
        RemoveFromCartRequest {
            product_id: product.id,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    // Catalog validation, exercised here so the suite shares one database
    // setup and cannot race another test's truncate.
    let admin_id = create_user(&state, "admin", "validation-admin@example.com").await?;
    let admin = AuthUser {
        user_id: admin_id,
        role: "admin".into(),
    };

    let err = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Broken".into(),
            description: "Negative price".into(),
            price: Decimal::from_str("-1.00")?,
            stock_quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "   ".into(),
            description: "Blank name".into(),
            price: Decimal::from_str("1.00")?,
            stock_quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let user = AuthUser {
        user_id: admin_id,
        role: "user".into(),
    };
    let err = product_service::create_product(
        &state,
        &user,
        CreateProductRequest {
            name: "No role".into(),
            description: "Requires admin".into(),
            price: Decimal::from_str("1.00")?,
            stock_quantity: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let created = product_service::create_product(
        &state,
        &admin,
        CreateProductRequest {
            name: "Valid Product".into(),
            description: "Non-negative price".into(),
            price: Decimal::from_str("0.00")?,
            stock_quantity: 1,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(created.price, Decimal::ZERO);

    Ok(())
}

async fn setup_state() -> anyhow::Result<Option<AppState>> {
    // Allow skipping when no DB is configured in the environment.
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE orders, cart_items, shopping_carts, audit_logs, products, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(Some(AppState {
        pool,
        orm,
        jwt_secret: "test-secret".into(),
    }))
}

async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}
