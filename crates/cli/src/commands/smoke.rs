//! Drives one shopper through the whole storefront dialogue with an in-memory
//! catalog and an in-memory SQLite session store. No network access.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, ensure, Context};
use aquashop_bot::{
    DispatchOutcome, EventDispatcher, EventPayload, HandlerRegistry, InboundEvent, RecordingSink,
};
use aquashop_core::catalog::{CatalogService, InMemoryCatalog};
use aquashop_core::credentials::CredentialCache;
use aquashop_core::domain::cart::CartId;
use aquashop_core::domain::product::{Price, Product, ProductId};
use aquashop_core::domain::session::UserId;
use aquashop_core::flows::DialogueState;
use aquashop_db::{connect_with_settings, migrations, SessionRepository, SqlSessionRepository};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{escape_json, runtime, CommandResult};

const SHOPPER: &str = "smoke-shopper";
const CHAT_ID: i64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

#[derive(Default)]
struct Checks {
    checks: Vec<SmokeCheck>,
    failed: bool,
}

impl Checks {
    fn skip(&mut self, name: &'static str) {
        self.checks.push(SmokeCheck {
            name,
            status: SmokeStatus::Skipped,
            elapsed_ms: 0,
            message: "skipped due previous failure".to_string(),
        });
    }

    /// Runs `check` unless an earlier check failed.
    async fn step<F>(&mut self, name: &'static str, check: F)
    where
        F: Future<Output = anyhow::Result<String>>,
    {
        if self.failed {
            self.skip(name);
            return;
        }

        let started = Instant::now();
        let result = check.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let check = match result {
            Ok(message) => SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message },
            Err(error) => {
                self.failed = true;
                let message = format!("{error:#}");
                SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message }
            }
        };
        self.checks.push(check);
    }
}

struct Shop {
    catalog: Arc<InMemoryCatalog>,
    sessions: Arc<SqlSessionRepository>,
    sink: Arc<RecordingSink>,
    dispatcher: EventDispatcher,
    next_update_id: i64,
}

impl Shop {
    async fn open() -> anyhow::Result<Self> {
        let pool = connect_with_settings("sqlite::memory:", 1, 5)
            .await
            .context("in-memory session store did not open")?;
        migrations::run_pending(&pool).await.context("session store migrations failed")?;

        let catalog = Arc::new(InMemoryCatalog::with_products(demo_products()));
        let sessions = Arc::new(SqlSessionRepository::new(pool));
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = EventDispatcher::new(
            sessions.clone(),
            Arc::new(CredentialCache::new(catalog.clone())),
            HandlerRegistry::new(catalog.clone()),
            sink.clone(),
        );

        Ok(Self { catalog, sessions, sink, dispatcher, next_update_id: 0 })
    }

    async fn send(&mut self, payload: EventPayload) -> anyhow::Result<String> {
        self.next_update_id += 1;
        let event = InboundEvent {
            update_id: self.next_update_id,
            user_id: UserId(SHOPPER.to_string()),
            first_name: Some("Smoke".to_string()),
            chat_id: CHAT_ID,
            payload,
            origin_message_id: Some(self.next_update_id),
        };

        if let DispatchOutcome::Dropped { error_class } = self.dispatcher.dispatch(&event).await {
            bail!("event {} was dropped ({error_class})", event.update_id);
        }

        let replies = self.sink.take().await;
        let last = replies.last().context("no reply was delivered")?;
        Ok(last.text.clone())
    }

    async fn press(&mut self, payload: &str) -> anyhow::Result<String> {
        let callback_id = format!("smoke-{}", self.next_update_id + 1);
        self.send(EventPayload::Button { payload: payload.to_string(), callback_id }).await
    }

    async fn state(&self) -> anyhow::Result<DialogueState> {
        let session = self.sessions.load_or_default(&UserId(SHOPPER.to_string())).await?;
        Ok(session.state)
    }
}

pub fn run() -> CommandResult {
    let started = Instant::now();

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "smoke",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let checks = runtime.block_on(run_scenario());
    finalize_report(checks, started.elapsed().as_millis() as u64)
}

async fn run_scenario() -> Vec<SmokeCheck> {
    let mut checks = Checks::default();

    let mut shop = None;
    checks
        .step("session_store", async {
            shop = Some(Shop::open().await?);
            anyhow::Ok("in-memory session store migrated".to_string())
        })
        .await;
    let Some(mut shop) = shop else {
        for name in SCENARIO_STEPS {
            checks.skip(name);
        }
        return checks.checks;
    };

    checks
        .step("menu_rendered", async {
            let text = shop
                .send(EventPayload::Command { name: "start".to_string(), arguments: String::new() })
                .await?;
            let state = shop.state().await?;
            ensure!(state == DialogueState::Description, "menu left the dialogue in {state:?}");
            anyhow::Ok(text)
        })
        .await;

    checks
        .step("product_described", async {
            let text = shop.press("smoke-guppy").await?;
            ensure!(text.starts_with("Name: Guppy"), "unexpected product card: {text}");
            anyhow::Ok("product card rendered for Guppy".to_string())
        })
        .await;

    checks
        .step("cart_item_added", async {
            shop.press("5").await?;
            let items = shop.catalog.get_cart_items(&smoke_token(), &cart_id()).await?;
            ensure!(
                items.len() == 1 && items[0].quantity == 5,
                "expected one cart line of 5 units, found {items:?}"
            );
            anyhow::Ok("5 units added to the cart".to_string())
        })
        .await;

    checks
        .step("cart_total", async {
            let text = shop.press("cart").await?;
            ensure!(text.starts_with("TOTAL: $12.50"), "unexpected cart summary: {text}");
            anyhow::Ok("cart total is $12.50".to_string())
        })
        .await;

    checks
        .step("cart_item_removed", async {
            let text = shop.press("smoke-guppy").await?;
            ensure!(text.contains("TOTAL: $0.00"), "cart was not emptied: {text}");
            anyhow::Ok("cart emptied by remove button".to_string())
        })
        .await;

    checks
        .step("checkout", async {
            shop.press("checkout").await?;
            let state = shop.state().await?;
            ensure!(state == DialogueState::WaitingEmail, "checkout left the dialogue in {state:?}");
            let text = shop.send(EventPayload::Text("smoke@example.com".to_string())).await?;
            ensure!(text.contains("smoke@example.com"), "confirmation lacks the email: {text}");
            let state = shop.state().await?;
            ensure!(state == DialogueState::Menu, "confirmation left the dialogue in {state:?}");
            ensure!(shop.catalog.customers().await.len() == 1, "customer was not registered");
            anyhow::Ok("customer registered and dialogue returned to menu".to_string())
        })
        .await;

    checks.checks
}

const SCENARIO_STEPS: [&str; 6] = [
    "menu_rendered",
    "product_described",
    "cart_item_added",
    "cart_total",
    "cart_item_removed",
    "checkout",
];

fn smoke_token() -> aquashop_core::credentials::AccessToken {
    aquashop_core::credentials::AccessToken::new("smoke")
}

fn cart_id() -> CartId {
    CartId(SHOPPER.to_string())
}

fn demo_products() -> Vec<Product> {
    [("smoke-guppy", "Guppy", 250), ("smoke-tetra", "Neon tetra", 100)]
        .into_iter()
        .map(|(id, name, cents)| {
            let amount = Decimal::new(cents, 2);
            let price = Price { amount, formatted: format!("${amount:.2}") };
            Product {
                id: ProductId(id.to_string()),
                name: name.to_string(),
                description: format!("{name} for the smoke run"),
                price_with_tax: price.clone(),
                price_without_tax: price,
                stock_level: 10,
                main_image: None,
            }
        })
        .collect()
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
