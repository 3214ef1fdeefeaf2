use aquashop_catalog::ElasticPathClient;
use aquashop_core::config::{AppConfig, LoadOptions};
use aquashop_core::credentials::TokenSource;
use aquashop_db::{connect_with_config, ping};
use serde::Serialize;

use crate::commands::{escape_json, runtime};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn from_result(name: &'static str, result: Result<String, String>) -> Self {
        match result {
            Ok(details) => Self { name, status: CheckStatus::Pass, details },
            Err(details) => Self { name, status: CheckStatus::Fail, details },
        }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            match runtime() {
                Ok(runtime) => {
                    checks.push(DoctorCheck::from_result(
                        "database_connectivity",
                        runtime.block_on(check_database(&config)),
                    ));
                    checks.push(DoctorCheck::from_result(
                        "catalog_credential",
                        runtime.block_on(check_catalog_credential(&config)),
                    ));
                }
                Err(error) => {
                    checks.push(DoctorCheck::from_result(
                        "database_connectivity",
                        Err(format!("failed to initialize async runtime: {error}")),
                    ));
                    checks.push(DoctorCheck::skipped(
                        "catalog_credential",
                        "the async runtime did not start",
                    ));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            let reason = "configuration did not load";
            checks.push(DoctorCheck::skipped("database_connectivity", reason));
            checks.push(DoctorCheck::skipped("catalog_credential", reason));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

async fn check_database(config: &AppConfig) -> Result<String, String> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
    let pinged = ping(&pool).await;
    pool.close().await;

    pinged
        .map(|()| format!("connected using `{}`", config.database.url))
        .map_err(|error| format!("database ping failed: {error}"))
}

async fn check_catalog_credential(config: &AppConfig) -> Result<String, String> {
    let client = ElasticPathClient::from_config(&config.catalog)
        .map_err(|error| format!("catalog client setup failed: {error}"))?;
    let credential = client.fetch_token().await.map_err(|error| error.to_string())?;

    Ok(format!(
        "token issued by `{}`, valid until {}",
        client.base_url(),
        credential.expires_at.to_rfc3339()
    ))
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
