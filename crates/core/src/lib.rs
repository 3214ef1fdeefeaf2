pub mod cart;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod messages;

pub use cart::{apply_toggle, summarize, toggle, CartSummary, LineSummary, ToggleOutcome};
pub use catalog::{CatalogError, CatalogService, InMemoryCatalog};
pub use credentials::{AccessToken, Credential, CredentialCache, CredentialError, TokenSource};
pub use domain::cart::{Cart, CartId, CartItem, CartItemId, CartTotals};
pub use domain::customer::{Customer, CustomerId, NewCustomer};
pub use domain::product::{FileId, Price, Product, ProductId};
pub use domain::session::{Session, UserId};
pub use errors::ApplicationError;
pub use flows::{
    DialogueAction, DialogueContext, DialogueEvent, DialogueState, FlowDefinition, FlowEngine,
    StorefrontFlow, TransitionOutcome,
};
