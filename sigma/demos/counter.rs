use serde::{Deserialize, Serialize};
use sigma::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;

const ACTOR_TYPE: &str = "Counter";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counter {
    value: i64,
    history: Vec<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sigma=debug".into()),
        )
        .with_timer(ChronoLocal::new("%H:%M:%S%.3f".into()))
        .init();

    let config = ProviderConfig::new()
        .with("provider", "table")
        .with("format", "compact")
        .with("max_slot_bytes", "256")
        .with("max_slots", "8")
        .with("latency_ms", "20");
    let storage = StorageProvider::activate("Demo", &config)?;

    let id = ActorIdentity::new(ACTOR_TYPE, "demo");
    let mut counter = ActorState::<Counter>::default();
    storage.read_state(ACTOR_TYPE, &id, &mut counter).await?;

    for _ in 0..5 {
        counter.state.value += 1;
        counter.state.history.push(counter.state.value);
        storage.write_state(ACTOR_TYPE, &id, &mut counter).await?;
        info!(value = counter.state.value, token = %counter.token, "counter persisted");
    }

    // A second handle holding an outdated token loses the race
    let mut stale = counter.clone().with_token(VersionToken::new("outdated"));
    stale.state.value = -1;
    if let Err(e) = storage.write_state(ACTOR_TYPE, &id, &mut stale).await {
        warn!("stale write rejected: {e}");
    }

    // Records written compact remain readable once the provider writes text
    let text = StorageProvider::activate("Demo", &config.clone().with("format", "text"))?;
    let mut reloaded = ActorState::<Counter>::default();
    text.read_state(ACTOR_TYPE, &id, &mut reloaded).await?;
    info!(value = reloaded.state.value, history = ?reloaded.state.history, "reloaded");

    // Fill the history until the record no longer fits
    loop {
        reloaded.state.history.extend(0..32);
        match text.write_state(ACTOR_TYPE, &id, &mut reloaded).await {
            Ok(()) => info!(entries = reloaded.state.history.len(), "history grown"),
            Err(e) if e.is_capacity() => {
                warn!("history no longer fits: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    text.clear_state(ACTOR_TYPE, &id, &mut reloaded).await?;
    info!("counter cleared");

    Ok(())
}
