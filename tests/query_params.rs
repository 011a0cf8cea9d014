use std::str::FromStr;

use autocompany_api::routes::params::{OrderListQuery, ProductQuery, ProductSortBy, SortOrder};
use axum::extract::Query;
use axum::http::Uri;
use rust_decimal::Decimal;

// Explicit paging parameters must survive urlencoded deserialization; the
// list endpoints take them as plain top-level fields.
#[test]
fn product_query_parses_explicit_paging() {
    let uri = Uri::from_static("/api/products?page=2&per_page=10");
    let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.page, Some(2));
    assert_eq!(query.per_page, Some(10));
    assert_eq!(query.pagination().normalize(), (2, 10, 10));
}

#[test]
fn product_query_defaults_when_absent() {
    let uri = Uri::from_static("/api/products");
    let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.page, None);
    assert_eq!(query.per_page, None);
    assert_eq!(query.pagination().normalize(), (1, 20, 0));
}

#[test]
fn product_query_parses_filters_alongside_paging() {
    let uri = Uri::from_static(
        "/api/products?page=3&per_page=5&q=filter&min_price=1.50&max_price=9.99&sort_by=price&sort_order=asc",
    );
    let Query(query) = Query::<ProductQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.page, Some(3));
    assert_eq!(query.per_page, Some(5));
    assert_eq!(query.q.as_deref(), Some("filter"));
    assert_eq!(query.min_price, Some(Decimal::from_str("1.50").unwrap()));
    assert_eq!(query.max_price, Some(Decimal::from_str("9.99").unwrap()));
    assert!(matches!(query.sort_by, Some(ProductSortBy::Price)));
    assert!(matches!(query.sort_order, Some(SortOrder::Asc)));
}

#[test]
fn order_list_query_parses_explicit_paging() {
    let uri = Uri::from_static("/api/orders?page=2&per_page=10&sort_order=desc");
    let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.page, Some(2));
    assert_eq!(query.per_page, Some(10));
    assert!(matches!(query.sort_order, Some(SortOrder::Desc)));
}

#[test]
fn paging_is_clamped_to_sane_bounds() {
    let uri = Uri::from_static("/api/orders?page=0&per_page=1000");
    let Query(query) = Query::<OrderListQuery>::try_from_uri(&uri).unwrap();
    assert_eq!(query.pagination().normalize(), (1, 100, 0));
}
