use tracing_subscriber::EnvFilter;

use gagaball_host::{HostConfig, LoopCommand, LoopUpdate, spawn_headless_match};

#[tokio::main]
async fn main() {
    let config = HostConfig::load();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    if config.logging.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    tracing::info!(
        tick_rate_hz = config.tick.tick_rate_hz,
        ai_opponents = config.game.ai_opponents,
        loopback_clients = config.lobby.loopback_clients,
        "Gagaball host starting"
    );

    let (cmd_tx, mut updates, handle) = match spawn_headless_match(config) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Failed to start match: {e}");
            std::process::exit(1);
        },
    };

    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, stopping match");
            let _ = cmd_tx.send(LoopCommand::Stop);
        }
    });

    while let Some(update) = updates.recv().await {
        match update {
            LoopUpdate::Snapshot { tick, snapshot } => {
                tracing::debug!(
                    tick,
                    phase = ?snapshot.phase,
                    remaining_ms = snapshot.remaining_ms,
                    eliminations = snapshot.elimination_count,
                    "Snapshot"
                );
            },
            LoopUpdate::Finished(_) => break,
        }
    }

    let summary = match handle.await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Match task failed: {e}");
            std::process::exit(1);
        },
    };
    ctrl_c.abort();

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("Failed to encode summary: {e}"),
    }
    tracing::info!(
        ticks = summary.ticks,
        stopped_early = summary.stopped_early,
        "Gagaball host finished"
    );
}
