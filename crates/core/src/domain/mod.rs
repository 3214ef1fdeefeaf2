pub mod cart;
pub mod customer;
pub mod product;
pub mod session;
