//! Speculative View Playground
//!
//! Two small scenes driven through the async runtime:
//!
//! - **todos**: items are added optimistically against a flaky fake server;
//!   rejected writes roll back, accepted ones are confirmed
//! - **search**: a burst of keystrokes is debounced into one filter run
//!   over a word list
//!
//! Environment variables:
//! - SVE_LOG: tracing filter (default `info`, try `speculative_view=trace`)
//! - SVE_REJECT_EVERY: the fake server rejects every n-th write (default 3)

mod server;

use std::time::Duration;

use speculative_view::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::server::FakeServer;

const WORDS: &[&str] = &[
    "epoch", "overlay", "optimistic", "oxidize", "oscillate", "deferred", "debounce", "settle",
    "speculate", "snapshot",
];

type Todos = Vec<String>;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("SVE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let reject_every = std::env::var("SVE_REJECT_EVERY")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3);

    if let Err(err) = todos(reject_every).await {
        warn!(error = %err, "todo scene aborted");
    }
    if let Err(err) = search().await {
        warn!(error = %err, "search scene aborted");
    }
}

async fn todos(reject_every: usize) -> Result<(), RuntimeError> {
    let config = EngineConfigBuilder::new()
        .semantics(ChannelSemantics::Overlay)
        .build()
        .map_err(EngineError::from)?;
    let engine: SpeculativeView<&str, Todos> = SpeculativeView::new(config)?;
    let (handle, task) = spawn(engine);
    let server = FakeServer::new(reject_every);

    handle.set_base("todos", server.list()).await?;
    let mut updates = handle.subscribe("todos").await?;
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            info!(
                items = ?snapshot.view.unwrap_or_default(),
                pending = snapshot.pending_mutations,
                "todos rendered"
            );
        }
    });

    let mut writes = Vec::new();
    for item in ["buy milk", "write docs", "ship release", "water plants"] {
        let handle = handle.clone();
        let server = server.clone();
        writes.push(tokio::spawn(async move {
            let label = item.to_string();
            let result = handle
                .optimistic(
                    "todos",
                    move |mut todos: Todos| {
                        todos.push(label.clone());
                        todos
                    },
                    server.add(item),
                )
                .await;
            (item, result)
        }));
    }

    for write in writes {
        let Ok((item, result)) = write.await else {
            continue;
        };
        match result {
            Ok(list) => info!(item, total = list.len(), "write confirmed"),
            Err(err) => warn!(item, error = %err, "write rolled back"),
        }
    }

    let final_view = handle.snapshot("todos").await?;
    info!(items = ?final_view.view, "todos settled");

    handle.shutdown().await?;
    let _ = task.await;
    let _ = watcher.await;
    Ok(())
}

async fn search() -> Result<(), RuntimeError> {
    let config = EngineConfigBuilder::new()
        .channel("query", ChannelConfig::typing())
        .build()
        .map_err(EngineError::from)?;
    let engine: SpeculativeView<&str, String, Vec<&'static str>> = SpeculativeView::new(config)?
        .with_derivation(|query: &String| {
            // Stand-in for an expensive filter.
            std::thread::sleep(Duration::from_millis(50));
            WORDS
                .iter()
                .copied()
                .filter(|word| word.starts_with(query.as_str()))
                .collect()
        });
    let (handle, task) = spawn(engine);
    let mut updates = handle.subscribe("query").await?;

    let mut typed = String::new();
    for key in ['o', 'p', 't'] {
        typed.push(key);
        let epoch = handle.set_live("query", typed.clone()).await?;
        let snapshot = handle.snapshot("query").await?;
        info!(%epoch, input = %typed, catching_up = snapshot.catching_up, "keystroke");
        tokio::time::sleep(Duration::from_millis(80)).await;
    }

    let settled = updates
        .wait_for(|snapshot| !snapshot.catching_up && snapshot.settled.is_some())
        .await
        .map_err(|_| RuntimeError::Shutdown)?
        .clone();
    if let Some(result) = settled.settled {
        info!(epoch = %result.epoch, matches = ?result.value, "search settled");
    }

    handle.shutdown().await?;
    let _ = task.await;
    Ok(())
}
