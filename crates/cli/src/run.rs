use std::{path::Path, sync::Arc};

use {
    anyhow::{Context, Result},
    postwatch_config::validate,
    postwatch_media::StagingArea,
    postwatch_pipeline::{DeliveryFormatter, Dispatcher, Pipeline, PostAssembler},
    postwatch_subscribers::JsonFileRegistry,
    postwatch_telegram::TelegramChannel,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use crate::config_commands;

/// Load config, wire the pipeline to the Telegram adapter and poll until
/// Ctrl-C. In-flight deliveries finish before returning.
pub async fn run(config_path: Option<&Path>) -> Result<()> {
    config_commands::ensure_valid(&validate::validate(config_path))?;
    let (config, loaded_from) = postwatch_config::load(config_path)?;
    match &loaded_from {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found; using defaults and environment"),
    }

    let registry = JsonFileRegistry::open(&config.subscribers.path).with_context(|| {
        format!(
            "failed to open subscriber registry {}",
            config.subscribers.path.display()
        )
    })?;
    info!(
        path = %config.subscribers.path.display(),
        subscribers = registry.len(),
        "subscriber registry opened"
    );

    let channel = TelegramChannel::connect(&config.telegram)
        .await
        .context("failed to connect telegram bot")?;
    let outbound = channel.outbound();

    let formatter = DeliveryFormatter::new(
        outbound.clone(),
        StagingArea::new(config.media.staging_dir.clone()),
    );
    let dispatcher = Dispatcher::new(Arc::new(formatter), outbound, config.pipeline.fanout_limit);
    let pipeline = Pipeline::new(
        PostAssembler::new(channel.history(), &config.pipeline),
        Arc::new(registry),
        Arc::new(dispatcher),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutdown requested");
                    cancel.cancel();
                },
                Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
            }
        }
    });

    let polled = channel.run(&pipeline, cancel).await;
    pipeline.shutdown().await;
    polled?;
    info!("postwatch stopped");
    Ok(())
}
