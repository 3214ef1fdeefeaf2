//! Inline keyboards for each storefront view.

use aquashop_core::domain::cart::CartItem;
use aquashop_core::domain::product::Product;
use aquashop_core::flows::states::{BACK_PAYLOAD, CART_PAYLOAD, CHECKOUT_PAYLOAD};

use crate::replies::Button;

pub const QUANTITY_CHOICES: [u32; 3] = [1, 5, 10];

pub fn menu_keyboard(products: &[Product]) -> Vec<Vec<Button>> {
    let mut rows: Vec<Vec<Button>> = products
        .iter()
        .map(|product| vec![Button::new(product.name.clone(), product.id.as_str())])
        .collect();
    rows.push(vec![Button::new("Cart", CART_PAYLOAD)]);
    rows
}

pub fn description_keyboard() -> Vec<Vec<Button>> {
    let quantities = QUANTITY_CHOICES
        .iter()
        .map(|quantity| {
            let unit = if *quantity == 1 { "unit" } else { "units" };
            Button::new(format!("{quantity} {unit}"), quantity.to_string())
        })
        .collect();
    vec![
        quantities,
        vec![Button::new("Back to menu", BACK_PAYLOAD)],
        vec![Button::new("Cart", CART_PAYLOAD)],
    ]
}

/// One remove button per line; the payload is the product id so a press
/// toggles that product out of the cart.
pub fn cart_keyboard(items: &[CartItem]) -> Vec<Vec<Button>> {
    let mut rows: Vec<Vec<Button>> = items
        .iter()
        .map(|item| vec![Button::new(format!("Remove {}", item.name), item.product_id.as_str())])
        .collect();
    if !items.is_empty() {
        rows.push(vec![Button::new("Checkout", CHECKOUT_PAYLOAD)]);
    }
    rows.push(vec![Button::new("Back to menu", BACK_PAYLOAD)]);
    rows
}

pub fn email_keyboard() -> Vec<Vec<Button>> {
    vec![vec![Button::new("Back to cart", BACK_PAYLOAD)]]
}

pub fn confirmation_keyboard() -> Vec<Vec<Button>> {
    vec![vec![Button::new("Back to menu", BACK_PAYLOAD)]]
}

#[cfg(test)]
mod tests {
    use aquashop_core::domain::cart::{CartItem, CartItemId};
    use aquashop_core::domain::product::ProductId;
    use rust_decimal::Decimal;

    use super::{cart_keyboard, description_keyboard};

    #[test]
    fn description_offers_fixed_quantities_then_navigation() {
        let rows = description_keyboard();
        let labels: Vec<&str> = rows[0].iter().map(|button| button.label.as_str()).collect();
        let payloads: Vec<&str> = rows[0].iter().map(|button| button.payload.as_str()).collect();

        assert_eq!(labels, vec!["1 unit", "5 units", "10 units"]);
        assert_eq!(payloads, vec!["1", "5", "10"]);
        assert_eq!(rows[1][0].payload, "back");
        assert_eq!(rows[2][0].payload, "cart");
    }

    #[test]
    fn cart_buttons_carry_product_ids_and_hide_checkout_when_empty() {
        let item = CartItem {
            id: CartItemId("line-1".to_owned()),
            product_id: ProductId("p1".to_owned()),
            name: "Guppy".to_owned(),
            description: String::new(),
            quantity: 5,
            unit_price: Decimal::new(250, 2),
        };

        let rows = cart_keyboard(&[item]);
        assert_eq!(rows[0][0].label, "Remove Guppy");
        assert_eq!(rows[0][0].payload, "p1");
        assert_eq!(rows[1][0].payload, "checkout");

        let empty = cart_keyboard(&[]);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0][0].payload, "back");
    }
}
