//! Host-side polling of a [`QueueClient`] into a [`QueueStateModel`].
//!
//! The model has no task of its own; the host spawns a poller on its tokio
//! runtime and stops it on shutdown. Failed polls are logged and leave the last
//! good snapshot in place. The server console is drained the same way into a
//! [`StatusBus`] of its own.

use super::client::{QueueClient, ServerStatus};
use super::model::QueueStateModel;
use crate::error::AppResult;
use crate::status::StatusBus;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn, Level};

/// Target recorded on server console lines.
pub const CONSOLE_TARGET: &str = "qserver";

/// Lower bound for the poll period.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fetch status and all three partitions once and apply them.
///
/// A disconnected server only updates the status.
pub async fn poll_once(client: &dyn QueueClient, model: &QueueStateModel) -> AppResult<()> {
    let status = match client.fetch_status().await {
        Ok(status) => status,
        Err(err) => {
            model.update_status(ServerStatus::disconnected(err.to_string()));
            return Err(err);
        }
    };
    let connected = status.connected;
    model.update_status(status);
    if !connected {
        return Ok(());
    }

    let (pending, active, completed) = tokio::try_join!(
        client.fetch_pending(),
        client.fetch_active(),
        client.fetch_completed()
    )?;
    model.apply_snapshot(pending, active, completed)
}

/// Handle to a running poller.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop polling and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!("poller task ended abnormally: {}", err);
        }
    }

    /// True once the polling task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Move console lines printed since the last call onto `bus`.
///
/// Returns how many lines were published. Trailing newlines are dropped and
/// blank lines skipped.
pub async fn drain_console(client: &dyn QueueClient, bus: &StatusBus) -> AppResult<usize> {
    let lines = client.fetch_console().await?;
    let mut published = 0;
    for line in lines {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        bus.emit(Level::INFO, CONSOLE_TARGET, line);
        published += 1;
    }
    Ok(published)
}

/// Spawn a poller on the current tokio runtime.
pub fn spawn_poller(
    client: Arc<dyn QueueClient>,
    model: Arc<QueueStateModel>,
    interval: Duration,
) -> PollerHandle {
    spawn_periodic("queue poller", interval, move || {
        let client = client.clone();
        let model = model.clone();
        async move { poll_once(client.as_ref(), &model).await }
    })
}

/// Spawn a task that keeps draining the server console onto `bus`.
pub fn spawn_console_monitor(
    client: Arc<dyn QueueClient>,
    bus: StatusBus,
    interval: Duration,
) -> PollerHandle {
    spawn_periodic("console monitor", interval, move || {
        let client = client.clone();
        let bus = bus.clone();
        async move { drain_console(client.as_ref(), &bus).await.map(|_| ()) }
    })
}

fn spawn_periodic<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> PollerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = AppResult<()>> + Send + 'static,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "{} started", name);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = tick().await {
                        warn!("{} failed: {}", name, err);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("{} stopped", name);
    });

    PollerHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::client::StaticQueueClient;
    use crate::queue::item::QueueItem;

    fn item(uid: &str) -> QueueItem {
        QueueItem::new(uid, "plan", "count")
    }

    #[tokio::test]
    async fn test_poll_once_applies_snapshot() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![item("b"), item("c")]);
        client.set_active(Some(item("a")));
        client.set_completed(vec![item("z")]);

        let model = QueueStateModel::new();
        poll_once(&client, &model).await.unwrap();

        let snapshot = model.snapshot();
        assert_eq!(snapshot.pending.len(), 2);
        assert_eq!(snapshot.active.as_ref().unwrap().uid, "a");
        assert_eq!(snapshot.completed[0].uid, "z");
        assert!(model.status().connected);
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_snapshot() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![item("a")]);
        let model = QueueStateModel::new();
        poll_once(&client, &model).await.unwrap();

        client.set_unreachable(true);
        assert!(poll_once(&client, &model).await.is_err());
        assert_eq!(model.snapshot().pending.len(), 1);
        assert!(!model.status().connected);
    }

    #[tokio::test]
    async fn test_disconnected_server_skips_fetch() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![item("a")]);
        client.set_status(ServerStatus::disconnected("closed"));
        let model = QueueStateModel::new();
        poll_once(&client, &model).await.unwrap();
        assert!(model.snapshot().pending.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_poller_updates_and_stops() {
        let client = Arc::new(StaticQueueClient::new());
        client.set_pending(vec![item("a")]);
        let model = Arc::new(QueueStateModel::new());
        let mut rx = model.subscribe();

        let handle = spawn_poller(client.clone(), model.clone(), Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(model.snapshot().pending[0].uid, "a");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_drain_console_publishes_lines() {
        let client = StaticQueueClient::new();
        client.push_console("Starting queue...\n");
        client.push_console("   ");
        client.push_console("Plan 'count' started");
        let bus = StatusBus::new(10);

        assert_eq!(drain_console(&client, &bus).await.unwrap(), 2);
        let history = bus.history();
        assert_eq!(history[0].text, "Starting queue...");
        assert_eq!(history[1].target, CONSOLE_TARGET);
        assert_eq!(drain_console(&client, &bus).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_console_monitor_runs_until_shutdown() {
        let client = Arc::new(StaticQueueClient::new());
        client.push_console("RE Manager started");
        let bus = StatusBus::new(10);
        let mut rx = bus.subscribe();

        let handle = spawn_console_monitor(client.clone(), bus.clone(), Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bus.latest().unwrap().text, "RE Manager started");
        handle.shutdown().await;
        assert_eq!(bus.len(), 1);
    }
}
