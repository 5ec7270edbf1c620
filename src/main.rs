//! `aframp-tx-watch <transaction-id>...`
//!
//! Watches the given anchor transactions until each one settles or the
//! process receives a shutdown signal.

use std::sync::Arc;

use aframp_wallet_core::config::LifecycleConfig;
use aframp_wallet_core::logging::init_tracing;
use aframp_wallet_core::{AnchorClient, Callbacks, TransactionWatcher, WatchError, WatchRequest};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping watches");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = LifecycleConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    let mut ids: Vec<String> = std::env::args().skip(1).collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        anyhow::bail!("usage: aframp-tx-watch <transaction-id>...");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        anchor = %config.anchor.base_url,
        interval_ms = config.watcher.interval_ms,
        count = ids.len(),
        "starting transaction watch"
    );

    let client = Arc::new(AnchorClient::new(config.anchor.clone())?);
    let watcher = TransactionWatcher::new(config.watcher.interval());
    let (settled_tx, mut settled_rx) = mpsc::unbounded_channel::<(String, bool)>();

    for id in &ids {
        let on_success = settled_tx.clone();
        let on_error = settled_tx.clone();
        let observer = Callbacks::new()
            .on_change(|handle| {
                info!(transaction_id = %handle.id, status = %handle.status, "status changed");
            })
            .on_success(move |handle| {
                let _ = on_success.send((handle.id.clone(), true));
            })
            .on_error(move |err| {
                if let WatchError::Fetch { .. } = err {
                    warn!(error = %err, "giving up on transaction after fetch error");
                }
                let _ = on_error.send((err.transaction_id().to_string(), false));
            });

        watcher.watch(WatchRequest::new(id.clone(), client.clone(), Arc::new(observer)));
    }
    drop(settled_tx);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut remaining = ids.len();
    let mut failed = 0usize;
    while remaining > 0 {
        tokio::select! {
            settled = settled_rx.recv() => match settled {
                Some((id, ok)) => {
                    remaining -= 1;
                    if !ok {
                        failed += 1;
                    }
                    info!(transaction_id = %id, succeeded = ok, remaining, "transaction settled");
                }
                None => break,
            },
            _ = &mut shutdown => break,
        }
    }

    watcher.stop_all();
    info!(
        settled = ids.len() - remaining,
        failed,
        unresolved = remaining,
        "transaction watch finished"
    );

    if failed > 0 {
        anyhow::bail!("{} transaction(s) did not complete", failed);
    }
    Ok(())
}
