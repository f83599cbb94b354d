// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use eventworker::config::WorkerConfig;

#[tokio::main]
async fn main() {
    let config = WorkerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        error!("rustls default crypto provider already installed");
    }

    if let Err(e) = eventworker::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
