//! User-facing texts of the storefront.

use crate::domain::customer::Customer;
use crate::domain::product::Product;

pub const STORE_NAME: &str = "Life Aquatic";

pub fn welcome_text(first_name: Option<&str>) -> String {
    let greeting = format!("Welcome to the '{STORE_NAME}' exotic aquarium fish store!");
    match first_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => format!("Hi, {name}!\n{greeting}"),
        None => greeting,
    }
}

pub fn product_card(product: &Product) -> String {
    format!(
        "Name: {name}\n------\nPrice: {price} per unit\nStock: {stock} units available\n------\nDescription: {description}",
        name = product.name,
        price = product.price_with_tax.formatted,
        stock = product.stock_level,
        description = product.description,
    )
}

pub fn added_to_cart(product: &Product, quantity: u32) -> String {
    let unit = if quantity == 1 { "unit" } else { "units" };
    format!("Added {quantity} {unit} of {} to your cart.", product.name)
}

pub fn empty_cart_text() -> String {
    "Your cart is empty.".to_owned()
}

pub fn email_prompt(first_name: Option<&str>) -> String {
    let name = first_name.map(str::trim).filter(|name| !name.is_empty()).unwrap_or("customer");
    format!("Dear {name},\nplease leave your email to get a call from our manager.")
}

pub fn order_confirmation(customer: &Customer) -> String {
    format!(
        "Your order ID is {order}.\nThank you for placing an order in '{STORE_NAME}' store.\nOur manager will get in touch with you soon on {email}.",
        order = customer.id.order_reference(),
        email = customer.email,
    )
}
