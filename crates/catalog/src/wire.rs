//! JSON shapes of the v2 API and their conversion into domain types.
//!
//! Monetary `amount` fields are integers in minor currency units.

use aquashop_core::catalog::CatalogError;
use aquashop_core::domain::cart::{CartId, CartItem, CartItemId, CartTotals};
use aquashop_core::domain::customer::{Customer, CustomerId};
use aquashop_core::domain::product::{FileId, Price, Product, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absolute expiry as unix seconds.
    #[serde(default)]
    pub expires: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Money {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub formatted: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisplayPrice {
    #[serde(default)]
    pub with_tax: Money,
    #[serde(default)]
    pub without_tax: Money,
}

#[derive(Debug, Default, Deserialize)]
pub struct Stock {
    #[serde(default)]
    pub level: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductMeta {
    #[serde(default)]
    pub display_price: DisplayPrice,
    #[serde(default)]
    pub stock: Stock,
}

#[derive(Debug, Deserialize)]
pub struct RelationshipRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub data: Option<RelationshipRef>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductRelationships {
    #[serde(default)]
    pub main_image: Option<Relationship>,
}

#[derive(Debug, Deserialize)]
pub struct ProductData {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta: ProductMeta,
    #[serde(default)]
    pub relationships: ProductRelationships,
}

#[derive(Debug, Deserialize)]
pub struct UnitPrice {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct CartItemData {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit_price: UnitPrice,
}

#[derive(Debug, Default, Deserialize)]
pub struct CartMeta {
    #[serde(default)]
    pub display_price: DisplayPrice,
}

#[derive(Debug, Deserialize)]
pub struct CartData {
    pub id: String,
    #[serde(default)]
    pub meta: CartMeta,
}

#[derive(Debug, Deserialize)]
pub struct CustomerData {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct FileLink {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub struct FileData {
    pub link: FileLink,
}

#[derive(Debug, Serialize)]
pub struct AddCartItem<'a> {
    pub id: &'a str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct CreateCustomer<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub struct Payload<T> {
    pub data: T,
}

fn minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

fn price(money: Money, field: &str) -> Result<Price, CatalogError> {
    let amount = money
        .amount
        .ok_or_else(|| CatalogError::Decode(format!("product is missing `{field}.amount`")))?;
    let amount = minor_units(amount);
    let formatted = money.formatted.unwrap_or_else(|| format!("${amount:.2}"));
    Ok(Price { amount, formatted })
}

impl TryFrom<ProductData> for Product {
    type Error = CatalogError;

    fn try_from(data: ProductData) -> Result<Self, Self::Error> {
        let display_price = data.meta.display_price;
        Ok(Product {
            id: ProductId(data.id),
            name: data.name,
            description: data.description,
            price_with_tax: price(display_price.with_tax, "display_price.with_tax")?,
            price_without_tax: price(display_price.without_tax, "display_price.without_tax")?,
            stock_level: data.meta.stock.level,
            main_image: data
                .relationships
                .main_image
                .and_then(|image| image.data)
                .map(|reference| FileId(reference.id)),
        })
    }
}

impl TryFrom<CartItemData> for CartItem {
    type Error = CatalogError;

    fn try_from(data: CartItemData) -> Result<Self, Self::Error> {
        let product_id = data.product_id.ok_or_else(|| {
            CatalogError::Decode(format!("cart item `{}` has no product_id", data.id))
        })?;
        Ok(CartItem {
            id: CartItemId(data.id),
            product_id: ProductId(product_id),
            name: data.name,
            description: data.description,
            quantity: data.quantity,
            unit_price: minor_units(data.unit_price.amount),
        })
    }
}

impl From<CartData> for CartTotals {
    fn from(data: CartData) -> Self {
        CartTotals { id: CartId(data.id), total_with_tax: data.meta.display_price.with_tax.formatted }
    }
}

impl From<CustomerData> for Customer {
    fn from(data: CustomerData) -> Self {
        Customer { id: CustomerId(data.id), name: data.name, email: data.email }
    }
}

#[cfg(test)]
mod tests {
    use aquashop_core::domain::cart::CartItem;
    use aquashop_core::domain::product::{FileId, Product};
    use rust_decimal::Decimal;

    use super::{CartItemData, Envelope, ProductData};

    #[test]
    fn product_payload_maps_price_stock_and_image() {
        let payload = serde_json::json!({
            "data": {
                "id": "p1",
                "type": "product",
                "name": "Guppy",
                "description": "Small and colourful",
                "meta": {
                    "display_price": {
                        "with_tax": {"amount": 250, "currency": "USD", "formatted": "$2.50"},
                        "without_tax": {"amount": 200, "currency": "USD", "formatted": "$2.00"}
                    },
                    "stock": {"level": 40, "availability": "in-stock"}
                },
                "relationships": {"main_image": {"data": {"type": "main_image", "id": "f1"}}}
            }
        });

        let envelope: Envelope<ProductData> =
            serde_json::from_value(payload).expect("product json");
        let product = Product::try_from(envelope.data).expect("product conversion");

        assert_eq!(product.price_with_tax.amount, Decimal::new(250, 2));
        assert_eq!(product.price_with_tax.formatted, "$2.50");
        assert_eq!(product.price_without_tax.amount, Decimal::new(200, 2));
        assert_eq!(product.stock_level, 40);
        assert_eq!(product.main_image, Some(FileId("f1".to_owned())));
    }

    #[test]
    fn product_without_price_fails_to_decode() {
        let payload = serde_json::json!({"id": "p1", "name": "Guppy"});
        let data: ProductData = serde_json::from_value(payload).expect("product json");

        assert!(Product::try_from(data).is_err());
    }

    #[test]
    fn cart_item_unit_price_is_converted_from_minor_units() {
        let payload = serde_json::json!({
            "id": "line-1",
            "type": "cart_item",
            "product_id": "p1",
            "name": "Guppy",
            "description": "Small and colourful",
            "quantity": 3,
            "unit_price": {"amount": 250, "currency": "USD", "includes_tax": true},
            "value": {"amount": 750, "currency": "USD", "includes_tax": true}
        });

        let data: CartItemData = serde_json::from_value(payload).expect("cart item json");
        let item = CartItem::try_from(data).expect("cart item conversion");

        assert_eq!(item.unit_price, Decimal::new(250, 2));
        assert_eq!(item.subtotal(), Decimal::new(750, 2));
        assert_eq!(item.product_id.as_str(), "p1");
    }
}
