//! Cart reconciliation: the remove-only toggle and the cart summary.
//!
//! Toggling never adds. A product reaches the cart only through an explicit
//! quantity selection, so pressing the same cart button twice removes the
//! item once and is a no-op the second time.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::{CatalogError, CatalogService};
use crate::credentials::AccessToken;
use crate::domain::cart::{Cart, CartId, CartItem};
use crate::domain::product::ProductId;

/// Returns the cart line to remove when `selected` is already in the cart.
pub fn toggle<'a>(items: &'a [CartItem], selected: &ProductId) -> Option<&'a CartItem> {
    items.iter().find(|item| &item.product_id == selected)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Removed(CartItem),
    NotInCart,
}

/// Fetches the current cart lines and issues a remove call when `selected` is
/// among them.
pub async fn apply_toggle(
    catalog: &dyn CatalogService,
    token: &AccessToken,
    cart_id: &CartId,
    selected: &ProductId,
) -> Result<ToggleOutcome, CatalogError> {
    let items = catalog.get_cart_items(token, cart_id).await?;
    let Some(item) = toggle(&items, selected) else {
        return Ok(ToggleOutcome::NotInCart);
    };

    catalog.remove_cart_item(token, cart_id, &item.id).await?;
    Ok(ToggleOutcome::Removed(item.clone()))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LineSummary {
    pub name: String,
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub total: Decimal,
    pub lines: Vec<LineSummary>,
}

pub fn summarize(cart: &Cart) -> CartSummary {
    let lines: Vec<LineSummary> = cart
        .items
        .iter()
        .map(|item| LineSummary {
            name: item.name.clone(),
            description: item.description.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal(),
        })
        .collect();
    let total = lines.iter().map(|line| line.subtotal).sum();

    CartSummary { total, lines }
}

impl CartSummary {
    pub fn total_line(&self) -> String {
        format!("TOTAL: {}", self.formatted_total())
    }

    pub fn formatted_total(&self) -> String {
        format!("${}", money(self.total))
    }

    /// The catalog-reported total, if it differs from the sum of the lines.
    pub fn disagreeing_total<'a>(&self, reported: Option<&'a str>) -> Option<&'a str> {
        reported.filter(|reported| *reported != self.formatted_total())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total first, then one block per line in cart order.
    pub fn render(&self) -> String {
        let blocks: Vec<String> = self.lines.iter().map(LineSummary::render).collect();
        format!("{}\n{}", self.total_line(), blocks.join("\n"))
    }
}

impl LineSummary {
    fn render(&self) -> String {
        format!(
            "\nName: {name}\n------\nPrice: ${price} per unit\nQuantity: {quantity} units\nSubtotal: ${subtotal}\n------\nDescription: {description}\n------------------------\n",
            name = self.name,
            price = money(self.unit_price),
            quantity = self.quantity,
            subtotal = money(self.subtotal),
            description = self.description,
        )
    }
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{apply_toggle, summarize, toggle, ToggleOutcome};
    use crate::catalog::{CatalogService, InMemoryCatalog};
    use crate::credentials::AccessToken;
    use crate::domain::cart::{Cart, CartId, CartItem, CartItemId};
    use crate::domain::product::ProductId;

    fn item(product: &str, name: &str, price: Decimal, quantity: u32) -> CartItem {
        CartItem {
            id: CartItemId(format!("line-{product}")),
            product_id: ProductId(product.to_owned()),
            name: name.to_owned(),
            description: format!("{name} description"),
            quantity,
            unit_price: price,
        }
    }

    fn fish_cart() -> Cart {
        Cart {
            id: CartId("1001".to_owned()),
            items: vec![
                item("guppy", "Guppy", Decimal::new(250, 2), 3),
                item("tetra", "Tetra", Decimal::new(100, 2), 2),
            ],
            total_price: None,
        }
    }

    #[test]
    fn summary_total_is_sum_of_price_times_quantity() {
        let summary = summarize(&fish_cart());

        assert_eq!(summary.total, Decimal::new(950, 2));
        assert_eq!(summary.total_line(), "TOTAL: $9.50");
        assert_eq!(summary.lines[0].subtotal, Decimal::new(750, 2));
        assert_eq!(summary.lines[1].subtotal, Decimal::new(200, 2));
    }

    #[test]
    fn rendered_summary_starts_with_total_then_items_in_cart_order() {
        let rendered = summarize(&fish_cart()).render();

        assert!(rendered.starts_with("TOTAL: $9.50\n"));
        let guppy = rendered.find("Name: Guppy").expect("guppy block");
        let tetra = rendered.find("Name: Tetra").expect("tetra block");
        assert!(guppy < tetra);
        assert!(rendered.contains("Price: $2.50 per unit"));
        assert!(rendered.contains("Quantity: 3 units"));
        assert!(rendered.contains("Subtotal: $7.50"));
        assert!(rendered.contains("Description: Guppy description"));
    }

    #[test]
    fn catalog_total_is_checked_against_line_items() {
        let summary = summarize(&fish_cart());

        assert_eq!(summary.disagreeing_total(Some("$9.50")), None);
        assert_eq!(summary.disagreeing_total(None), None);
        assert_eq!(summary.disagreeing_total(Some("$11.40")), Some("$11.40"));
    }

    #[test]
    fn empty_cart_summarizes_to_zero() {
        let summary = summarize(&Cart::empty(CartId("1001".to_owned())));

        assert!(summary.is_empty());
        assert_eq!(summary.total_line(), "TOTAL: $0.00");
    }

    #[test]
    fn toggle_only_matches_products_already_in_cart() {
        let cart = fish_cart();

        let hit = toggle(&cart.items, &ProductId("tetra".to_owned()));
        assert_eq!(hit.map(|item| item.id.clone()), Some(CartItemId("line-tetra".to_owned())));
        assert!(toggle(&cart.items, &ProductId("molly".to_owned())).is_none());
    }

    #[tokio::test]
    async fn toggling_twice_removes_once_and_never_readds() {
        let catalog = InMemoryCatalog::new();
        let token = AccessToken::new("token");
        let cart_id = CartId("1001".to_owned());
        let guppy = ProductId("guppy".to_owned());
        catalog.seed_cart_item(&cart_id, item("guppy", "Guppy", Decimal::new(250, 2), 3)).await;

        let first = apply_toggle(&catalog, &token, &cart_id, &guppy).await.expect("first toggle");
        assert!(matches!(first, ToggleOutcome::Removed(ref removed) if removed.product_id == guppy));

        let second = apply_toggle(&catalog, &token, &cart_id, &guppy).await.expect("second toggle");
        assert_eq!(second, ToggleOutcome::NotInCart);

        let items = catalog.get_cart_items(&token, &cart_id).await.expect("cart items");
        assert!(items.is_empty());
        assert_eq!(catalog.calls_named("remove_cart_item").await, 1);
        assert_eq!(catalog.calls_named("add_cart_item").await, 0);
    }
}
