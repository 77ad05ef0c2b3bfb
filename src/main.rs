// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-7702 delegation relay server.

use std::{net::SocketAddr, process::ExitCode, sync::Arc};

use email_guardian_recovery::{
    api::router,
    blockchain::DelegationSubmitter,
    config::{DelegationConfig, LOG_FORMAT_ENV},
    state::AppState,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match DelegationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let relayer = match DelegationSubmitter::configure(
        None,
        &config.rpc_url,
        Some(&config.relayer_private_key),
    ) {
        Ok(relayer) => relayer,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize delegation relayer");
            return ExitCode::FAILURE;
        }
    };

    if let DelegationSubmitter::Local(local) = &relayer {
        tracing::info!(relayer = %local.relayer(), "Delegations paid from local relayer key");
    }

    let addr: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, address = %config.bind_address(), "Failed to parse bind address");
            return ExitCode::FAILURE;
        }
    };

    let app = router(AppState::new(Arc::new(relayer)));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, rpc_url = %config.rpc_url, "Delegation relay listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
