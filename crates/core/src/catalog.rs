//! Contract with the remote commerce backend plus an in-memory implementation
//! used by tests and the CLI smoke run.
//!
//! Every call takes the access token explicitly. Callers obtain it from the
//! credential cache right before the call; implementations never refresh it.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::credentials::{AccessToken, Credential, CredentialError, TokenSource};
use crate::domain::cart::{CartId, CartItem, CartItemId, CartTotals};
use crate::domain::customer::{Customer, CustomerId, NewCustomer};
use crate::domain::product::{FileId, Product, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("catalog responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("catalog response could not be decoded: {0}")]
    Decode(String),
    #[error("{entity} `{id}` was not found in the catalog")]
    NotFound { entity: &'static str, id: String },
}

#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_products(&self, token: &AccessToken) -> Result<Vec<Product>, CatalogError>;

    async fn get_product(
        &self,
        token: &AccessToken,
        product_id: &ProductId,
    ) -> Result<Product, CatalogError>;

    async fn get_cart(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<CartTotals, CatalogError>;

    async fn get_cart_items(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<Vec<CartItem>, CatalogError>;

    async fn add_cart_item(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError>;

    async fn remove_cart_item(
        &self,
        token: &AccessToken,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<(), CatalogError>;

    async fn create_customer(
        &self,
        token: &AccessToken,
        customer: &NewCustomer,
    ) -> Result<CustomerId, CatalogError>;

    async fn get_customer(
        &self,
        token: &AccessToken,
        customer_id: &CustomerId,
    ) -> Result<Customer, CatalogError>;

    /// Public download link of an uploaded file.
    async fn file_link(&self, token: &AccessToken, file_id: &FileId)
        -> Result<String, CatalogError>;
}

#[derive(Default)]
struct CatalogState {
    products: Vec<Product>,
    files: HashMap<FileId, String>,
    carts: HashMap<CartId, Vec<CartItem>>,
    customers: Vec<Customer>,
    calls: Vec<String>,
    failures: HashMap<&'static str, CatalogError>,
    next_line: u64,
    tokens_issued: u64,
}

/// Catalog backed by process memory. Adding a product that is already in a
/// cart increases that line's quantity, mirroring the hosted backend.
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self { state: Mutex::new(CatalogState::default()) }
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self { state: Mutex::new(CatalogState { products, ..CatalogState::default() }) }
    }

    pub async fn insert_file(&self, file_id: FileId, link: impl Into<String>) {
        self.state.lock().await.files.insert(file_id, link.into());
    }

    pub async fn seed_cart_item(&self, cart_id: &CartId, item: CartItem) {
        self.state.lock().await.carts.entry(cart_id.clone()).or_default().push(item);
    }

    /// Makes every later call of `operation` fail with `error`.
    pub async fn fail_on(&self, operation: &'static str, error: CatalogError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.state.lock().await.customers.clone()
    }

    pub async fn calls(&self) -> Vec<String> {
        self.state.lock().await.calls.clone()
    }

    pub async fn calls_named(&self, operation: &str) -> usize {
        self.state.lock().await.calls.iter().filter(|call| call.as_str() == operation).count()
    }

    pub async fn tokens_issued(&self) -> u64 {
        self.state.lock().await.tokens_issued
    }
}

fn record(state: &mut CatalogState, operation: &'static str) -> Result<(), CatalogError> {
    state.calls.push(operation.to_owned());
    match state.failures.get(operation) {
        Some(error) => Err(error.clone()),
        None => Ok(()),
    }
}

fn find_product<'a>(
    state: &'a CatalogState,
    product_id: &ProductId,
) -> Result<&'a Product, CatalogError> {
    state
        .products
        .iter()
        .find(|product| &product.id == product_id)
        .ok_or_else(|| CatalogError::NotFound { entity: "product", id: product_id.0.clone() })
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn list_products(&self, _token: &AccessToken) -> Result<Vec<Product>, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "list_products")?;
        Ok(state.products.clone())
    }

    async fn get_product(
        &self,
        _token: &AccessToken,
        product_id: &ProductId,
    ) -> Result<Product, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "get_product")?;
        find_product(&state, product_id).cloned()
    }

    async fn get_cart(
        &self,
        _token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<CartTotals, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "get_cart")?;
        let total: Decimal = state
            .carts
            .get(cart_id)
            .map(|items| items.iter().map(CartItem::subtotal).sum())
            .unwrap_or_default();
        Ok(CartTotals { id: cart_id.clone(), total_with_tax: Some(format!("${total:.2}")) })
    }

    async fn get_cart_items(
        &self,
        _token: &AccessToken,
        cart_id: &CartId,
    ) -> Result<Vec<CartItem>, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "get_cart_items")?;
        Ok(state.carts.get(cart_id).cloned().unwrap_or_default())
    }

    async fn add_cart_item(
        &self,
        _token: &AccessToken,
        cart_id: &CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "add_cart_item")?;
        let product = find_product(&state, product_id)?.clone();

        state.next_line += 1;
        let line_id = CartItemId(format!("line-{}", state.next_line));
        let items = state.carts.entry(cart_id.clone()).or_default();
        match items.iter_mut().find(|item| item.product_id == product.id) {
            Some(existing) => existing.quantity += quantity,
            None => items.push(CartItem {
                id: line_id,
                product_id: product.id,
                name: product.name,
                description: product.description,
                quantity,
                unit_price: product.price_with_tax.amount,
            }),
        }
        Ok(())
    }

    async fn remove_cart_item(
        &self,
        _token: &AccessToken,
        cart_id: &CartId,
        item_id: &CartItemId,
    ) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "remove_cart_item")?;
        if let Some(items) = state.carts.get_mut(cart_id) {
            items.retain(|item| &item.id != item_id);
        }
        Ok(())
    }

    async fn create_customer(
        &self,
        _token: &AccessToken,
        customer: &NewCustomer,
    ) -> Result<CustomerId, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "create_customer")?;
        let sequence = state.customers.len() + 1;
        let id = CustomerId(format!("{sequence:08x}-0000-4000-8000-000000000000"));
        state.customers.push(Customer {
            id: id.clone(),
            name: customer.name.clone(),
            email: customer.email.clone(),
        });
        Ok(id)
    }

    async fn get_customer(
        &self,
        _token: &AccessToken,
        customer_id: &CustomerId,
    ) -> Result<Customer, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "get_customer")?;
        state
            .customers
            .iter()
            .find(|customer| &customer.id == customer_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound { entity: "customer", id: customer_id.0.clone() })
    }

    async fn file_link(
        &self,
        _token: &AccessToken,
        file_id: &FileId,
    ) -> Result<String, CatalogError> {
        let mut state = self.state.lock().await;
        record(&mut state, "file_link")?;
        state
            .files
            .get(file_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound { entity: "file", id: file_id.0.clone() })
    }
}

#[async_trait]
impl TokenSource for InMemoryCatalog {
    async fn fetch_token(&self) -> Result<Credential, CredentialError> {
        let mut state = self.state.lock().await;
        state.tokens_issued += 1;
        Ok(Credential {
            access_token: AccessToken::new(format!("memory-token-{}", state.tokens_issued)),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }
}
