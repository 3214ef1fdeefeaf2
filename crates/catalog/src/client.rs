use std::time::Duration;

use aquashop_core::catalog::{CatalogError, CatalogService};
use aquashop_core::config::CatalogConfig;
use aquashop_core::credentials::{AccessToken, Credential, CredentialError, TokenSource};
use aquashop_core::domain::cart::{CartId, CartItem, CartItemId, CartTotals};
use aquashop_core::domain::customer::{Customer, CustomerId, NewCustomer};
use aquashop_core::domain::product::{FileId, Product, ProductId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::wire::{
    AddCartItem, CartData, CartItemData, CreateCustomer, CustomerData, Envelope, FileData,
    Payload, ProductData, TokenResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.moltin.com";

/// Longest response body excerpt carried in errors.
const BODY_EXCERPT_LEN: usize = 512;

#[derive(Clone, Debug)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Elastic Path v2 client. It issues client-credentials tokens through
/// [`TokenSource`] and serves every other call through [`CatalogService`],
/// always with the bearer token handed in by the caller.
#[derive(Clone)]
pub struct ElasticPathClient {
    http: reqwest::Client,
    base_url: String,
    credentials: ClientCredentials,
}

impl ElasticPathClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: ClientCredentials,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CatalogError::Transport(error.to_string()))?;
        Ok(Self::with_http_client(http, base_url, credentials))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        base_url: impl Into<String>,
        credentials: ClientCredentials,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { http, base_url, credentials }
    }

    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        Self::new(
            config.base_url.clone(),
            ClientCredentials {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
            },
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        request.bearer_auth(token.expose())
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
    ) -> Result<T, CatalogError> {
        let request = self.authorized(self.http.get(self.url(path)), token);
        decode(send(request).await?).await
    }

    async fn fetch_data<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        path: &str,
    ) -> Result<T, CatalogError> {
        let envelope: Envelope<T> = self.fetch(token, path).await?;
        Ok(envelope.data)
    }

    /// Like `fetch_data`, but a 404 names the missing entity.
    async fn fetch_entity<T: DeserializeOwned>(
        &self,
        token: &AccessToken,
        entity: &'static str,
        id: &str,
        path: &str,
    ) -> Result<T, CatalogError> {
        self.fetch_data(token, path).await.map_err(|error| not_found_as(error, entity, id))
    }
}

fn not_found_as(error: CatalogError, entity: &'static str, id: &str) -> CatalogError {
    match error {
        CatalogError::Status { status: 404, .. } => {
            CatalogError::NotFound { entity, id: id.to_owned() }
        }
        other => other,
    }
}

async fn send(request: RequestBuilder) -> Result<Response, CatalogError> {
    let response =
        request.send().await.map_err(|error| CatalogError::Transport(error.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

fn status_error(status: StatusCode, body: &str) -> CatalogError {
    let mut excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
    if excerpt.len() < body.len() {
        excerpt.push_str("...");
    }
    CatalogError::Status { status: status.as_u16(), body: excerpt }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let bytes = response.bytes().await.map_err(|error| CatalogError::Transport(error.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|error| CatalogError::Decode(error.to_string()))
}

fn credential_expiry(
    response: &TokenResponse,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, CredentialError> {
    if let Some(expires) = response.expires {
        return DateTime::<Utc>::from_timestamp(expires, 0).ok_or_else(|| {
            CredentialError::Decode(format!("token expiry `{expires}` is out of range"))
        });
    }
    match response.expires_in {
        Some(seconds) => Ok(now + chrono::Duration::seconds(seconds)),
        None => Err(CredentialError::Decode(
            "token response carries neither `expires` nor `expires_in`".to_owned(),
        )),
    }
}

#[async_trait]
impl TokenSource for ElasticPathClient {
    #[instrument(skip(self), fields(client_id = %self.credentials.client_id))]
    async fn fetch_token(&self) -> Result<Credential, CredentialError> {
        let form = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose_secret()),
            ("grant_type", "client_credentials"),
        ];
        let response = self
            .http
            .post(self.url("/oauth/access_token"))
            .form(&form)
            .send()
            .await
            .map_err(|error| CredentialError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(BODY_EXCERPT_LEN).collect(),
            });
        }

        let token: TokenResponse =
            response.json().await.map_err(|error| CredentialError::Decode(error.to_string()))?;
        let expires_at = credential_expiry(&token, Utc::now())?;
        debug!(expires_at = %expires_at, "catalog token issued");

        Ok(Credential { access_token: AccessToken::new(token.access_token), expires_at })
    }
}

#[async_trait]
impl CatalogService for ElasticPathClient {
    async fn list_products(&self, token: &AccessToken) -> Result<Vec<Product>, CatalogError> {
        let products: Vec<ProductData> = self.fetch_data(token, "/v2/products").await?;
        products.into_iter().map(Product::try_from).collect()
    }

    async fn get_product(
        &self,
        token: &AccessToken,
        product_id: &ProductId,
    ) -> Result<Product, CatalogError> {
        let path = format!("/v2/products/{}", product_id.0);
        let product: ProductData =
            self.fetch_entity(token, "product", product_id.as_str(), &path).await?;
        Product::try_from(product)
    }

    async fn get_cart(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<CartTotals, CatalogError> {
        let cart: CartData = self.fetch_data(token, &format!("/v2/carts/{}", cart_id.0)).await?;
        Ok(cart.into())
    }

    async fn get_cart_items(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<Vec<CartItem>, CatalogError> {
        let items: Vec<CartItemData> =
            self.fetch_data(token, &format!("/v2/carts/{}/items", cart_id.0)).await?;
        items.into_iter().map(CartItem::try_from).collect()
    }

    async fn add_cart_item(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        let body = Payload {
            data: AddCartItem { id: product_id.as_str(), kind: "cart_item", quantity },
        };
        let request = self
            .authorized(self.http.post(self.url(&format!("/v2/carts/{}/items", cart_id.0))), token)
            .json(&body);
        send(request).await?;
        Ok(())
    }

    async fn remove_cart_item(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<(), CatalogError> {
        let path = format!("/v2/carts/{}/items/{}", cart_id.0, item_id.0);
        send(self.authorized(self.http.delete(self.url(&path)), token))
            .await
            .map_err(|error| not_found_as(error, "cart_item", &item_id.0))?;
        Ok(())
    }

    async fn create_customer(
        &self,
        token: &AccessToken,
        customer: &NewCustomer,
    ) -> Result<CustomerId, CatalogError> {
        let body = Payload {
            data: CreateCustomer {
                kind: "customer",
                name: &customer.name,
                email: &customer.email,
            },
        };
        let request =
            self.authorized(self.http.post(self.url("/v2/customers")), token).json(&body);
        let created: Envelope<CustomerData> = decode(send(request).await?).await?;
        Ok(CustomerId(created.data.id))
    }

    async fn get_customer(
        &self,
        token: &AccessToken,
        customer_id: &CustomerId,
    ) -> Result<Customer, CatalogError> {
        let path = format!("/v2/customers/{}", customer_id.0);
        let customer: CustomerData =
            self.fetch_entity(token, "customer", &customer_id.0, &path).await?;
        Ok(customer.into())
    }

    async fn file_link(
        &self,
        token: &AccessToken,
        file_id: &FileId,
    ) -> Result<String, CatalogError> {
        let path = format!("/v2/files/{}", file_id.0);
        let file: FileData = self.fetch_entity(token, "file", &file_id.0, &path).await?;
        Ok(file.link.href)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use reqwest::StatusCode;

    use super::{credential_expiry, not_found_as, status_error};
    use crate::wire::TokenResponse;
    use aquashop_core::catalog::CatalogError;

    #[test]
    fn absolute_expiry_wins_over_relative_lifetime() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid instant");
        let response = TokenResponse {
            access_token: "t".to_owned(),
            expires: Some(now.timestamp() + 60),
            expires_in: Some(3600),
        };

        let expiry = credential_expiry(&response, now).expect("expiry");
        assert_eq!(expiry, now + chrono::Duration::seconds(60));
    }

    #[test]
    fn relative_lifetime_is_used_when_absolute_expiry_is_missing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid instant");
        let response =
            TokenResponse { access_token: "t".to_owned(), expires: None, expires_in: Some(3600) };

        assert_eq!(credential_expiry(&response, now).expect("expiry"), now + chrono::Duration::hours(1));

        let neither = TokenResponse { access_token: "t".to_owned(), expires: None, expires_in: None };
        assert!(credential_expiry(&neither, now).is_err());
    }

    #[test]
    fn only_404_is_reported_as_missing_entity() {
        let missing = not_found_as(status_error(StatusCode::NOT_FOUND, "{}"), "file", "f1");
        assert_eq!(missing, CatalogError::NotFound { entity: "file", id: "f1".to_owned() });

        let forbidden = not_found_as(status_error(StatusCode::FORBIDDEN, "{}"), "file", "f1");
        assert!(matches!(forbidden, CatalogError::Status { status: 403, .. }));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let error = status_error(StatusCode::BAD_GATEWAY, &body);

        match error {
            CatalogError::Status { status, body } => {
                assert_eq!(status, 502);
                assert!(body.len() < 600);
                assert!(body.ends_with("..."));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
