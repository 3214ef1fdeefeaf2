//! HTTP client for the hosted Elastic Path (moltin) v2 commerce API.

pub mod client;
pub mod wire;

pub use client::{ClientCredentials, ElasticPathClient, DEFAULT_BASE_URL};
