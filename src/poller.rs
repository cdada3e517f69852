//! Background refresh timer and shutdown signal handling.

use std::future::Future;
use std::time::Duration;

use async_channel::Sender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::controller::{Intent, RefreshOrigin};

/// Spawn the refresh timer. Every `interval` it queues a background refresh;
/// it keeps going after failed refreshes and stops once the receiver is gone.
pub fn spawn_poller(interval: Duration, sender: Sender<Intent>) -> JoinHandle<()> {
    tracing::info!(interval_secs = interval.as_secs(), "Message polling configured");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load is done by the caller
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let intent = Intent::Refresh {
                origin: RefreshOrigin::Poll,
            };
            if sender.send(intent).await.is_err() {
                tracing::debug!("Intent channel closed, stopping poller");
                break;
            }
        }
    })
}

/// Drive `work` to completion unless `stop` resolves first, in which case the
/// work is dropped and `None` is returned.
pub async fn unless_stopped<F, S>(work: F, stop: &mut S) -> Option<F::Output>
where
    F: Future,
    S: Future + Unpin,
{
    tokio::select! {
        output = work => Some(output),
        _ = stop => None,
    }
}

/// Resolve on Ctrl+C or SIGTERM.
///
/// If a handler cannot be installed the failure is logged and that signal is
/// simply never observed.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poller_sends_refresh_and_stops_when_closed() {
        let (tx, rx) = async_channel::unbounded();
        let handle = spawn_poller(Duration::from_millis(20), tx);

        // Nothing is queued for the immediate first tick
        assert!(rx.is_empty());

        let intent = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            intent,
            Intent::Refresh {
                origin: RefreshOrigin::Poll
            }
        );

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_unless_stopped_returns_finished_work() {
        let mut never = std::future::pending::<()>();
        assert_eq!(unless_stopped(async { 7 }, &mut never).await, Some(7));
    }

    #[tokio::test]
    async fn test_unless_stopped_abandons_pending_work() {
        let mut stop = Box::pin(tokio::time::sleep(Duration::from_millis(20)));
        let slow_request = tokio::time::sleep(Duration::from_secs(60));

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            unless_stopped(slow_request, &mut stop),
        )
        .await
        .unwrap();
        assert_eq!(outcome, None);
    }
}
