use thiserror::Error;

use crate::catalog::CatalogError;
use crate::credentials::CredentialError;

/// Failure while handling one inbound event. Any of these drops the event:
/// the stored dialogue state is left as it was.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("delivery failure: {0}")]
    Delivery(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable label for the `error_class` log field.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::Catalog(CatalogError::NotFound { .. }) => "catalog_not_found",
            Self::Catalog(_) => "catalog",
            Self::Persistence(_) => "persistence",
            Self::Delivery(_) => "delivery",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Whether replaying the same event later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Credential(CredentialError::Request(_)) => true,
            Self::Catalog(CatalogError::Transport(_)) => true,
            Self::Catalog(CatalogError::Status { status, .. }) => *status >= 500,
            Self::Persistence(_) | Self::Delivery(_) => true,
            _ => false,
        }
    }
}
