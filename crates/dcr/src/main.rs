mod hooks;

use std::{sync::Arc, time::Duration};

use anyhow::Context;

use dcr_core::{
    config::Config,
    dispatcher::CommandDispatcher,
    events::{self, ConnectionState, LoggingObserver},
    offset::FileOffsetStore,
    poller::Poller,
    security::AllowList,
    supervisor::RemoteServices,
    upload::PhotoUploader,
};
use dcr_telegram::TelegramSource;

use crate::hooks::HookSink;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dcr_core::logging::init("dcr")?;

    let cfg = Config::load().context("loading configuration")?;

    let source = Arc::new(TelegramSource::connect(
        &cfg.telegram_bot_token,
        cfg.poll_timeout,
    )?);
    let offsets = Arc::new(FileOffsetStore::for_bot(&cfg.offset_dir, &cfg.bot_key()));
    tracing::info!(path = %offsets.path().display(), "offset store");

    let uploader = PhotoUploader::new(source.clone(), cfg.photo_upload_delay);
    let sink = Arc::new(HookSink::new(&cfg, uploader));
    let allowed = AllowList::new(cfg.telegram_allowed_chats.iter().copied());
    let allowed_chats = allowed.len();
    let dispatcher = CommandDispatcher::new(source.clone(), sink, allowed);

    let (tx, rx) = events::channel();
    let observer = tokio::spawn(async move {
        let mut observer = LoggingObserver;
        events::run_observer(rx, &mut observer).await;
    });

    let poller = Poller::new(cfg.poller(), source, offsets, dispatcher, tx);
    let mut state = poller.watch_state();

    let mut services = RemoteServices::new();
    services.register_telegram(poller.clone());
    poller.start();
    tracing::info!(
        allowed_chats,
        "{}",
        services.status_description()
    );

    let failed = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            tracing::info!("shutdown requested");
            false
        }
        _ = state.wait_for(|s| *s == ConnectionState::Failed) => true,
    };

    services.stop_all();
    let stopped = tokio::time::timeout(
        SHUTDOWN_GRACE,
        state.wait_for(|s| {
            matches!(s, ConnectionState::Disconnected | ConnectionState::Failed)
        }),
    )
    .await
    .is_ok();
    if !stopped {
        tracing::warn!("poller did not stop within {SHUTDOWN_GRACE:?}");
    }

    drop(poller);
    observer.abort();

    if failed {
        anyhow::bail!("telegram remote control could not connect");
    }
    Ok(())
}
