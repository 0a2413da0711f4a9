//! Catalog reads, caching, and language negotiation.

use axum::{
    Json, Router,
    extract::{Path, RawQuery},
    routing::get,
};
use nature_core::{Locale, Price};
use nature_integration_tests::{StubBackend, product_json};
use nature_storefront::api::types::ProductQuery;
use serde_json::json;

fn catalog_backend() -> Router {
    Router::new()
        .route(
            "/api/products/",
            get(|RawQuery(query): RawQuery| async move {
                let page2 = query.as_deref().is_some_and(|q| q.contains("page=2"));
                if page2 {
                    Json(json!({
                        "count": 3,
                        "next": null,
                        "previous": "http://stub/api/products/?page=1",
                        "results": [product_json(3, "retreat", "125.00", Some(8))]
                    }))
                } else {
                    Json(json!({
                        "count": 3,
                        "next": "http://stub/api/products/?page=2",
                        "previous": null,
                        "results": [
                            product_json(1, "oak", "50.00", Some(2)),
                            product_json(2, "honey", "12.50", None)
                        ]
                    }))
                }
            }),
        )
        .route(
            "/api/products/{slug}/",
            get(|Path(slug): Path<String>| async move {
                Json(product_json(1, &slug, "50.00", Some(2)))
            }),
        )
        .route(
            "/api/products/featured/",
            get(|| async { Json(json!([product_json(1, "oak", "50.00", Some(2))])) }),
        )
        .route(
            "/api/products/new_arrivals/",
            get(|| async {
                Json(json!([
                    product_json(3, "retreat", "125.00", Some(8)),
                    product_json(2, "honey", "12.50", None)
                ]))
            }),
        )
        .route(
            "/api/categories/{slug}/",
            get(|Path(slug): Path<String>| async move {
                Json(json!({"id": 1, "name": "Árboles", "slug": slug}))
            }),
        )
        .route(
            "/api/products/{slug}/availability/",
            get(|| async { Json(json!({"is_available": false, "stock": 2})) }),
        )
        .route(
            "/api/categories/",
            get(|| async {
                Json(json!({
                    "count": 2,
                    "results": [
                        {"id": 1, "name": "Árboles", "slug": "trees"},
                        {"id": 2, "name": "Retiros", "slug": "retreats"}
                    ]
                }))
            }),
        )
}

#[tokio::test]
async fn test_list_products_sends_filters_and_language() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();
    t.storefront.language().set(Locale::En);

    let query = ProductQuery {
        category: Some("trees".to_string()),
        search: Some("oak tree".to_string()),
        ..ProductQuery::default()
    };
    let page = t.storefront.catalog().list_products(&query).await.unwrap();
    assert_eq!(page.results.len(), 2);
    assert_eq!(page.results[0].price, Price::from_cents(5000));

    let request = &backend.requests()[0];
    assert_eq!(request.query.as_deref(), Some("category=trees&search=oak+tree"));
    assert_eq!(request.accept_language.as_deref(), Some("en"));
    assert!(request.authorization.is_none());
}

#[tokio::test]
async fn test_responses_are_cached_per_language() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();
    let catalog = t.storefront.catalog();

    catalog.categories().await.unwrap();
    catalog.categories().await.unwrap();
    assert_eq!(backend.requests().len(), 1);

    t.storefront.language().set(Locale::En);
    catalog.categories().await.unwrap();
    assert_eq!(backend.requests().len(), 2);
    assert_eq!(backend.requests()[0].accept_language.as_deref(), Some("es"));

    catalog.invalidate();
    catalog.categories().await.unwrap();
    assert_eq!(backend.requests().len(), 3);
}

#[tokio::test]
async fn test_all_products_follows_pagination() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();

    let products = t.storefront.catalog().all_products().await.unwrap();
    let ids: Vec<i64> = products.iter().map(|p| p.id.as_i64()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn test_product_detail_and_availability() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();
    let catalog = t.storefront.catalog();

    let product = catalog.product_by_slug("adopt-an-oak").await.unwrap();
    assert_eq!(product.slug, "adopt-an-oak");

    let availability = catalog.check_availability("adopt-an-oak", 3).await.unwrap();
    assert!(!availability.is_available);
    assert_eq!(availability.stock, Some(2));

    // Availability is never cached
    catalog.check_availability("adopt-an-oak", 3).await.unwrap();
    assert_eq!(
        backend.request_lines(),
        vec![
            "GET /api/products/adopt-an-oak/",
            "GET /api/products/adopt-an-oak/availability/",
            "GET /api/products/adopt-an-oak/availability/"
        ]
    );
    assert_eq!(backend.requests()[1].query.as_deref(), Some("quantity=3"));
}

#[tokio::test]
async fn test_featured_products_limit() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();

    let featured = t.storefront.catalog().featured_products(1).await.unwrap();
    assert_eq!(featured.len(), 1);
    assert_eq!(featured[0].slug, "oak");
    assert_eq!(backend.request_lines(), vec!["GET /api/products/featured/"]);
    assert_eq!(backend.requests()[0].query.as_deref(), Some("limit=1"));

    // Served from cache the second time
    t.storefront.catalog().featured_products(1).await.unwrap();
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_new_arrivals() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();

    let arrivals = t.storefront.catalog().new_arrivals(10).await.unwrap();
    let slugs: Vec<&str> = arrivals.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["retreat", "honey"]);
    assert_eq!(backend.request_lines(), vec!["GET /api/products/new_arrivals/"]);
    assert_eq!(backend.requests()[0].query.as_deref(), Some("limit=10"));
}

#[tokio::test]
async fn test_category_by_slug() {
    let backend = StubBackend::start(catalog_backend()).await;
    let t = backend.storefront();

    let category = t.storefront.catalog().category_by_slug("trees").await.unwrap();
    assert_eq!(category.slug, "trees");
    assert_eq!(category.name, "Árboles");
    assert_eq!(backend.request_lines(), vec!["GET /api/categories/trees/"]);
}

#[tokio::test]
async fn test_missing_product_is_not_found() {
    let backend = StubBackend::start(Router::new()).await;
    let t = backend.storefront();

    let err = t
        .storefront
        .catalog()
        .product_by_slug("nope")
        .await
        .unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
}
