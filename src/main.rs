use std::io::Error;
use std::time::Duration;

use dispatch_engine::{AttemptEventKind, Config, DispatchEngine, Message, SimulatedBackend};
use serde_json::json;
use tokio::main;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[main]
async fn main() -> Result<(), Error> {
    let config = Config::try_parse().map_err(Error::other)?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_filter).map_err(Error::other)?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        max_attempts = config.engine.max_attempts,
        rate_limit = config.engine.rate_limit.limit,
        breaker_threshold = config.engine.breaker.failure_threshold,
        "starting dispatch engine"
    );

    let engine = DispatchEngine::new(
        config.engine,
        vec![
            SimulatedBackend::new("primary", 0.6, Duration::from_millis(40)),
            SimulatedBackend::new("secondary", 0.3, Duration::from_millis(80)),
            SimulatedBackend::new("fallback", 0.05, Duration::from_millis(120)),
        ],
    )
    .map_err(Error::other)?;

    engine
        .subscribe(AttemptEventKind::Updated, |attempt| {
            if attempt.status.is_terminal() {
                tracing::info!(
                    attempt_id = %attempt.id,
                    status = %attempt.status,
                    backend = ?attempt.backend,
                    rounds = attempt.attempt_count,
                    "attempt finished"
                );
            }
            Ok(())
        })
        .await;

    let batch = [
        Message::new("alice@example.com", "Welcome", "Thanks for signing up."),
        Message::new("bob@example.com", "Invoice #1042", "Your invoice is attached.")
            .with_sender("billing@example.com"),
        Message::new("carol@example.com", "Password reset", "Use the link to reset."),
        Message::new("alice@example.com", "Welcome", "Thanks for signing up."),
    ];

    for message in batch {
        match engine.submit(message).await {
            Ok(id) => tracing::info!(attempt_id = %id, "submitted"),
            Err(err) => tracing::warn!(error = %err, "submission rejected"),
        }
    }

    engine.wait_until_idle().await;

    let summary = json!({
        "attempts": engine.list_attempts().await.map_err(Error::other)?,
        "backends": engine.get_backend_status().await,
        "queue": engine.get_queue_status().await,
        "rate_limit": engine.get_rate_limit_status().await,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).map_err(Error::other)?
    );

    Ok(())
}
