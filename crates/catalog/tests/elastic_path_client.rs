//! Integration tests for ElasticPathClient against a mocked v2 API.

use std::time::Duration;

use aquashop_catalog::{ClientCredentials, ElasticPathClient};
use aquashop_core::catalog::{CatalogError, CatalogService};
use aquashop_core::credentials::{AccessToken, CredentialError, TokenSource};
use aquashop_core::domain::cart::{CartId, CartItemId};
use aquashop_core::domain::customer::{CustomerId, NewCustomer};
use aquashop_core::domain::product::{FileId, ProductId};
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ElasticPathClient {
    ElasticPathClient::new(
        server.uri(),
        ClientCredentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string().into(),
        },
        Duration::from_secs(5),
    )
    .expect("client")
}

fn token() -> AccessToken {
    AccessToken::new("bearer-123")
}

fn product_json(id: &str, name: &str, amount: i64) -> serde_json::Value {
    json!({
        "id": id,
        "type": "product",
        "name": name,
        "description": format!("{name} description"),
        "meta": {
            "display_price": {
                "with_tax": {"amount": amount, "currency": "USD", "formatted": format!("${}.{:02}", amount / 100, amount % 100)},
                "without_tax": {"amount": amount, "currency": "USD", "formatted": "n/a"}
            },
            "stock": {"level": 12}
        },
        "relationships": {"main_image": {"data": {"type": "main_image", "id": format!("img-{id}")}}}
    })
}

#[tokio::test]
async fn token_request_posts_client_credentials_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-token",
            "token_type": "Bearer",
            "expires": 4_102_444_800_i64,
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = client(&server).fetch_token().await.expect("token");

    assert_eq!(credential.access_token.expose(), "fresh-token");
    assert_eq!(credential.expires_at.timestamp(), 4_102_444_800);
}

#[tokio::test]
async fn rejected_client_credentials_surface_as_credential_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/access_token"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"errors":[{"title":"Unauthorized"}]}"#))
        .mount(&server)
        .await;

    let error = client(&server).fetch_token().await.expect_err("rejected");

    assert!(matches!(error, CredentialError::Rejected { status: 401, .. }));
}

#[tokio::test]
async fn products_are_listed_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/products"))
        .and(header("authorization", "Bearer bearer-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [product_json("p1", "Guppy", 250), product_json("p2", "Tetra", 100)]
        })))
        .mount(&server)
        .await;

    let products = client(&server).list_products(&token()).await.expect("products");

    assert_eq!(products.len(), 2);
    assert_eq!(products[0].name, "Guppy");
    assert_eq!(products[0].price_with_tax.formatted, "$2.50");
    assert_eq!(products[1].price_with_tax.amount, Decimal::new(100, 2));
}

#[tokio::test]
async fn product_and_file_link_are_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/products/p1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"data": product_json("p1", "Guppy", 250)})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/files/img-p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "img-p1", "link": {"href": "https://files.example/guppy.png"}}
        })))
        .mount(&server)
        .await;

    let catalog = client(&server);
    let product = catalog.get_product(&token(), &ProductId("p1".to_string())).await.expect("product");
    let image = product.main_image.clone().expect("image reference");
    let link = catalog.file_link(&token(), &image).await.expect("link");

    assert_eq!(image, FileId("img-p1".to_string()));
    assert_eq!(link, "https://files.example/guppy.png");
}

#[tokio::test]
async fn add_to_cart_posts_cart_item_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/carts/42/items"))
        .and(body_json(json!({"data": {"id": "p1", "type": "cart_item", "quantity": 5}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .add_cart_item(&token(), &CartId("42".to_string()), &ProductId("p1".to_string()), 5)
        .await
        .expect("add");
}

#[tokio::test]
async fn cart_items_and_totals_are_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/carts/42/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "id": "line-1",
                "type": "cart_item",
                "product_id": "p1",
                "name": "Guppy",
                "description": "Small",
                "quantity": 5,
                "unit_price": {"amount": 250, "currency": "USD"},
                "value": {"amount": 1250, "currency": "USD"}
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/carts/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "42", "meta": {"display_price": {"with_tax": {"amount": 1250, "formatted": "$12.50"}}}}
        })))
        .mount(&server)
        .await;

    let catalog = client(&server);
    let cart_id = CartId("42".to_string());
    let items = catalog.get_cart_items(&token(), &cart_id).await.expect("items");
    let totals = catalog.get_cart(&token(), &cart_id).await.expect("cart");

    assert_eq!(items[0].id, CartItemId("line-1".to_string()));
    assert_eq!(items[0].subtotal(), Decimal::new(1250, 2));
    assert_eq!(totals.total_with_tax.as_deref(), Some("$12.50"));
}

#[tokio::test]
async fn remove_item_deletes_by_line_id() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v2/carts/42/items/line-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .remove_cart_item(&token(), &CartId("42".to_string()), &CartItemId("line-1".to_string()))
        .await
        .expect("remove");
}

#[tokio::test]
async fn customer_is_created_then_read_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/customers"))
        .and(body_json(json!({"data": {"type": "customer", "name": "42", "email": "ann@example.com"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "c8a2f1e0-9b1d", "type": "customer", "name": "42", "email": "ann@example.com"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/customers/c8a2f1e0-9b1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "c8a2f1e0-9b1d", "type": "customer", "name": "42", "email": "ann@example.com"}
        })))
        .mount(&server)
        .await;

    let catalog = client(&server);
    let id = catalog
        .create_customer(
            &token(),
            &NewCustomer { name: "42".to_string(), email: "ann@example.com".to_string() },
        )
        .await
        .expect("create");
    let customer = catalog.get_customer(&token(), &id).await.expect("read back");

    assert_eq!(id, CustomerId("c8a2f1e0-9b1d".to_string()));
    assert_eq!(customer.id.order_reference(), "c8a2f1e0");
}

#[tokio::test]
async fn non_success_status_is_reported_with_body_excerpt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/products/p1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("catalog maintenance"))
        .mount(&server)
        .await;

    let error = client(&server)
        .get_product(&token(), &ProductId("p1".to_string()))
        .await
        .expect_err("unavailable catalog");

    assert_eq!(
        error,
        CatalogError::Status { status: 503, body: "catalog maintenance".to_string() }
    );
}

#[tokio::test]
async fn missing_entities_are_reported_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/files/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("file not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/products/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("product not found"))
        .mount(&server)
        .await;

    let catalog = client(&server);
    let file = catalog.file_link(&token(), &FileId("gone".to_string())).await;
    let product = catalog.get_product(&token(), &ProductId("missing".to_string())).await;

    assert_eq!(file, Err(CatalogError::NotFound { entity: "file", id: "gone".to_string() }));
    assert_eq!(
        product.map(|product| product.id),
        Err(CatalogError::NotFound { entity: "product", id: "missing".to_string() })
    );
}
