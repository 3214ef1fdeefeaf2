use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aquashop_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn field(key: &'static str, value: impl Into<String>, env_keys: &'static [&'static str]) -> Field {
    Field { key, value: value.into(), env_keys }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in effective_fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn effective_fields(config: &AppConfig) -> Vec<Field> {
    vec![
        field("database.url", &config.database.url, &["AQUASHOP_DATABASE_URL"]),
        field(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["AQUASHOP_DATABASE_MAX_CONNECTIONS"],
        ),
        field(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["AQUASHOP_DATABASE_TIMEOUT_SECS"],
        ),
        field(
            "telegram.bot_token",
            redact_bot_token(config.telegram.bot_token.expose_secret()),
            &["AQUASHOP_TELEGRAM_BOT_TOKEN", "TELEGRAM_TOKEN"],
        ),
        field(
            "telegram.api_base_url",
            &config.telegram.api_base_url,
            &["AQUASHOP_TELEGRAM_API_BASE_URL"],
        ),
        field(
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["AQUASHOP_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        field("catalog.base_url", &config.catalog.base_url, &["AQUASHOP_CATALOG_BASE_URL"]),
        field(
            "catalog.client_id",
            &config.catalog.client_id,
            &["AQUASHOP_CATALOG_CLIENT_ID", "ELASTICPATH_CLIENT_ID"],
        ),
        field(
            "catalog.client_secret",
            redact_secret(config.catalog.client_secret.expose_secret()),
            &["AQUASHOP_CATALOG_CLIENT_SECRET", "ELASTICPATH_CLIENT_SECRET"],
        ),
        field(
            "catalog.timeout_secs",
            config.catalog.timeout_secs.to_string(),
            &["AQUASHOP_CATALOG_TIMEOUT_SECS"],
        ),
        field(
            "dispatch.max_active_users",
            config.dispatch.max_active_users.to_string(),
            &["AQUASHOP_DISPATCH_MAX_ACTIVE_USERS"],
        ),
        field(
            "server.bind_address",
            &config.server.bind_address,
            &["AQUASHOP_SERVER_BIND_ADDRESS"],
        ),
        field(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["AQUASHOP_SERVER_HEALTH_CHECK_PORT"],
        ),
        field(
            "logging.level",
            &config.logging.level,
            &["AQUASHOP_LOGGING_LEVEL", "AQUASHOP_LOG_LEVEL"],
        ),
        field(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["AQUASHOP_LOGGING_FORMAT", "AQUASHOP_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("aquashop.toml"), PathBuf::from("config/aquashop.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the bot id half of `<bot id>:<secret>`; it is public in every bot link anyway.
pub(crate) fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}

fn redact_secret(secret: &str) -> String {
    let marker = if secret.trim().is_empty() { "<empty>" } else { "<redacted>" };
    marker.to_string()
}
