//! SES Forwarder - SQS consumer relaying SES-received email to LMTP.
//!
//! Polls the SQS queue for SES receipt notifications, fetches each raw email
//! from S3 and delivers it to the configured LMTP server.

use std::sync::Arc;

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use forwarder::{Config, Forwarder, IngestionLoop, LmtpClient, S3Store, SqsQueue};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may be set directly
    let dotenv = dotenvy::dotenv();

    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(dotenv_loaded = dotenv.is_ok(), "forwarder_starting");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "config_invalid");
            return Err(e).context("Failed to load configuration");
        }
    };
    info!(
        sqs_queue_url = %config.sqs_queue_url,
        lmtp_host = %config.lmtp_host,
        lmtp_from = %config.lmtp_from,
        mailboxes = %config.mailboxes.known().join(","),
        default_mailbox = %config.mailboxes.default_mailbox(),
        max_receive_count = ?config.max_receive_count,
        lmtp_timeout_secs = config.lmtp_timeout.as_secs(),
        "config_loaded"
    );

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&aws), config.sqs_queue_url.clone());
    let store = S3Store::new(aws_sdk_s3::Client::new(&aws));
    let sink = LmtpClient::new(config.lmtp_host.clone(), config.lmtp_timeout);

    let forwarder = Forwarder::from_config(&config, Arc::new(store), Arc::new(sink));
    let consumer = IngestionLoop::new(Arc::new(queue), forwarder)
        .with_max_receive_count(config.max_receive_count);

    let ctx = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown_signal(ctx.clone()));

    info!("forwarder_ready");
    consumer.run(ctx).await;

    info!("forwarder_shutdown_complete");
    Ok(())
}

/// Cancel `ctx` on SIGINT or SIGTERM.
async fn cancel_on_shutdown_signal(ctx: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "sigint_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("forwarder_stopping");
    ctx.cancel();
}
