use aquashop_catalog::ElasticPathClient;
use aquashop_core::config::{AppConfig, LoadOptions};
use aquashop_core::credentials::{CredentialError, TokenSource};
use serde_json::json;

use crate::commands::{runtime, CommandResult};

pub fn run(reveal: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "token",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let client = match ElasticPathClient::from_config(&config.catalog) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "token",
                "catalog_client",
                format!("catalog client setup failed: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "token",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(client.fetch_token()) {
        Ok(credential) => {
            let access_token = if reveal {
                credential.access_token.expose().to_string()
            } else {
                "<redacted>".to_string()
            };
            CommandResult::success_with(
                "token",
                format!("token valid until {}", credential.expires_at.to_rfc3339()),
                Some(json!({
                    "access_token": access_token,
                    "expires_at": credential.expires_at.to_rfc3339(),
                })),
            )
        }
        Err(error) => {
            let error_class = match error {
                CredentialError::Request(_) => "catalog_unreachable",
                CredentialError::Rejected { .. } => "credentials_rejected",
                CredentialError::Decode(_) => "token_decode",
            };
            CommandResult::failure("token", error_class, error.to_string(), 4)
        }
    }
}
