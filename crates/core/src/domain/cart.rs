use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::domain::session::UserId;

/// Carts are keyed by the chat user, one cart per user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartId(pub String);

impl From<&UserId> for CartId {
    fn from(user_id: &UserId) -> Self {
        Self(user_id.0.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart-level figures as reported by the catalog, without line items.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub id: CartId,
    pub total_with_tax: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub items: Vec<CartItem>,
    pub total_price: Option<String>,
}

impl Cart {
    pub fn assemble(totals: CartTotals, items: Vec<CartItem>) -> Self {
        Self { id: totals.id, items, total_price: totals.total_with_tax }
    }

    pub fn empty(id: CartId) -> Self {
        Self { id, items: Vec::new(), total_price: None }
    }
}
