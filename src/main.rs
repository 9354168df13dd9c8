use std::sync::Arc;
use std::time::Duration;

mod app;
mod bot;
mod catalog;
mod config;
mod delivery;
mod error;
mod models;
mod scheduler;
mod services;
mod store;

use app::App;
use config::Config;
use error::Result;
use scheduler::{run_daily, DailySchedule};
use services::TelegramClient;

/// Pause after a failed long-poll before asking again.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (info by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let send_now = args.len() >= 2 && args[1] == "--send-now";

    // Load configuration
    let config = Config::load()?;
    let token = config.require_token()?.to_string();
    let schedule = DailySchedule::new(config.tz()?, config.send_at()?);

    let client = Arc::new(TelegramClient::new(token, config.poll_timeout_secs)?);
    let app = Arc::new(App::new(&config, client.clone()));

    for id in app.catalog.oversized_identifiers() {
        tracing::warn!(
            "Album id {:?} is longer than {} bytes; its rating buttons will be rejected",
            id,
            catalog::MAX_IDENTIFIER_BYTES
        );
    }

    // Headless: run the daily job once and exit
    if send_now {
        let outcome = app.send_daily_albums().await?;
        println!("Daily send finished: {:?}", outcome);
        return Ok(());
    }

    tracing::info!(
        "Bot started, daily send at {} {}, data in {:?}",
        config.send_time,
        config.timezone,
        config.base_dir
    );

    let trigger = tokio::spawn(run_daily(schedule, Arc::clone(&app)));

    tokio::select! {
        _ = run_polling(&client, &app, config.poll_timeout_secs) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }

    trigger.abort();
    Ok(())
}

/// Inbound loop: one update at a time. A failing update is logged and skipped.
async fn run_polling(client: &TelegramClient, app: &App, timeout: u32) {
    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset, timeout).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Polling failed: {}", e);
                tokio::time::sleep(POLL_ERROR_PAUSE).await;
                continue;
            }
        };

        for update in updates {
            offset = update.update_id + 1;
            if let Err(e) = app.handle_update(&update).await {
                tracing::error!("Failed to handle update {}: {}", update.update_id, e);
            }
        }
    }
}
