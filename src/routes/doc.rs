use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartItemDto, CartLineDto, CartView, RemoveFromCartRequest},
        orders::{CreateOrderRequest, OrderDto, OrderList, UpdateOrderRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{CartStatus, Product},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::view_cart,
        cart::add_to_cart,
        cart::remove_from_cart,
        products::list_products,
        products::create_product,
        products::get_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order
    ),
    components(
        schemas(
            Product,
            CartStatus,
            AddToCartRequest,
            RemoveFromCartRequest,
            CartItemDto,
            CartLineDto,
            CartView,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderDto,
            OrderList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderDto>,
            ApiResponse<OrderList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Products", description = "Product catalog endpoints"),
        (name = "Cart", description = "Shopping cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
