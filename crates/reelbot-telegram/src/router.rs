use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use reelbot_core::{
    config::Config,
    download::Orchestrator,
    messaging::MessagingPort,
    probe::MediaProbe,
    relay::{Relay, RelaySettings},
    telemetry::TelemetryQueue,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}

/// Long-poll Telegram until the dispatcher is stopped (Ctrl-C).
pub async fn run_polling(
    cfg: Arc<Config>,
    orchestrator: Arc<Orchestrator>,
    probe: Arc<dyn MediaProbe>,
    telemetry: Arc<TelemetryQueue>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!("bot started: @{}", me.username()),
        Err(e) => return Err(anyhow::anyhow!("failed to reach Telegram: {e}")),
    }
    tracing::info!(
        temp_dir = %cfg.temp_dir.display(),
        proxy = cfg.proxy_url.is_some(),
        admin = cfg.admin_user_id.is_some(),
        max_attempts = cfg.max_attempts,
        "relay configured"
    );

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let relay = Arc::new(Relay::new(
        orchestrator,
        probe,
        messenger,
        telemetry,
        RelaySettings::from(cfg.as_ref()),
    ));

    let state = Arc::new(AppState { relay });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}
