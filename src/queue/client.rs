//! Queue client capability.
//!
//! The queue state model never talks to the queue server itself. Anything that
//! implements [`QueueClient`] can feed it: a ZMQ or HTTP transport supplied by the
//! embedding application, the no-op [`NullQueueClient`] used by default, or the
//! in-memory [`StaticQueueClient`] used by demos and tests.
//!
//! Only the three fetches are required. Control requests (start, stop, clear,
//! submit, update) refuse by default, so a client that does not override them is
//! read-only. The console stream defaults to silence and the plan catalog to
//! "not available".

use super::item::QueueItem;
use super::plan::PlanDefinition;
use crate::error::{AppResult, GuiError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Connection and engine state reported by the queue server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Whether the server answered the last status request
    pub connected: bool,
    /// Queue state (e.g. "idle", "running")
    pub queue_state: String,
    /// Run engine state, or the error text when disconnected
    pub re_state: String,
    /// A stop was requested and takes effect after the running item
    #[serde(default)]
    pub stop_pending: bool,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            connected: false,
            queue_state: "unknown".to_string(),
            re_state: "unknown".to_string(),
            stop_pending: false,
        }
    }
}

/// Queue controls that make sense for a server status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueActions {
    /// Start executing the queue
    pub start: bool,
    /// Stop after the running item
    pub stop: bool,
    /// Remove every pending item
    pub clear: bool,
}

impl ServerStatus {
    /// Status of a reachable server.
    pub fn connected(queue_state: impl Into<String>, re_state: impl Into<String>) -> Self {
        Self {
            connected: true,
            queue_state: queue_state.into(),
            re_state: re_state.into(),
            stop_pending: false,
        }
    }

    /// Status after a failed request.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self {
            connected: false,
            queue_state: "error".to_string(),
            re_state: reason.into(),
            stop_pending: false,
        }
    }

    /// Mark a requested stop.
    pub fn with_stop_pending(mut self, stop_pending: bool) -> Self {
        self.stop_pending = stop_pending;
        self
    }

    /// The queue is executing items.
    pub fn queue_running(&self) -> bool {
        self.connected && (self.queue_state == "executing_queue" || self.re_state == "running")
    }

    /// The run engine environment is not open.
    pub fn re_closed(&self) -> bool {
        !self.connected || self.re_state == "closed"
    }

    /// Enabled controls.
    ///
    /// Start while the queue is idle, stop while it runs, neither while the
    /// environment is closed or a stop is already pending. Clear needs pending
    /// items and a reachable server.
    pub fn actions(&self, pending: usize) -> QueueActions {
        let open = !self.re_closed() && !self.stop_pending;
        QueueActions {
            start: open && !self.queue_running(),
            stop: open && self.queue_running(),
            clear: self.connected && pending > 0,
        }
    }
}

fn read_only(action: &str) -> GuiError {
    GuiError::QueueClient(format!("cannot {}: client is read-only", action))
}

/// Source of queue snapshots.
///
/// Implementations perform any blocking network work themselves and only hand
/// finished results back to the caller.
#[async_trait]
pub trait QueueClient: Send + Sync + std::fmt::Debug {
    /// Items waiting in the queue, in submission order.
    async fn fetch_pending(&self) -> AppResult<Vec<QueueItem>>;

    /// The item currently executing, if any.
    async fn fetch_active(&self) -> AppResult<Option<QueueItem>>;

    /// Finished items, oldest first.
    async fn fetch_completed(&self) -> AppResult<Vec<QueueItem>>;

    /// Server status. Clients without a status endpoint report "disconnected".
    async fn fetch_status(&self) -> AppResult<ServerStatus> {
        Ok(ServerStatus::default())
    }

    /// Append an item to the server's queue. Read-only clients refuse.
    async fn submit_item(&self, item: QueueItem) -> AppResult<()> {
        Err(read_only(&format!("submit '{}'", item.name)))
    }

    /// Replace the pending item with the same uid. Read-only clients refuse.
    async fn update_item(&self, item: QueueItem) -> AppResult<()> {
        Err(read_only(&format!("update '{}'", item.uid)))
    }

    /// Start executing the queue. Read-only clients refuse.
    async fn start_queue(&self) -> AppResult<()> {
        Err(read_only("start the queue"))
    }

    /// Stop after the running item. Read-only clients refuse.
    async fn stop_queue(&self) -> AppResult<()> {
        Err(read_only("stop the queue"))
    }

    /// Remove every pending item. Read-only clients refuse.
    async fn clear_queue(&self) -> AppResult<()> {
        Err(read_only("clear the queue"))
    }

    /// Console lines printed by the server since the last call, oldest first.
    async fn fetch_console(&self) -> AppResult<Vec<String>> {
        Ok(Vec::new())
    }

    /// Plans and instructions the server allows.
    async fn fetch_plans(&self) -> AppResult<Vec<PlanDefinition>> {
        Err(GuiError::QueueClient("no plan catalog available".to_string()))
    }
}

/// Client that always reports an empty queue.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullQueueClient;

#[async_trait]
impl QueueClient for NullQueueClient {
    async fn fetch_pending(&self) -> AppResult<Vec<QueueItem>> {
        Ok(Vec::new())
    }

    async fn fetch_active(&self) -> AppResult<Option<QueueItem>> {
        Ok(None)
    }

    async fn fetch_completed(&self) -> AppResult<Vec<QueueItem>> {
        Ok(Vec::new())
    }
}

#[derive(Debug)]
struct StaticState {
    pending: Vec<QueueItem>,
    active: Option<QueueItem>,
    completed: Vec<QueueItem>,
    status: ServerStatus,
    console: VecDeque<String>,
    plans: Vec<PlanDefinition>,
    unreachable: bool,
}

/// In-memory client whose contents are set directly.
#[derive(Debug)]
pub struct StaticQueueClient {
    state: Mutex<StaticState>,
}

impl Default for StaticQueueClient {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticQueueClient {
    /// Empty, reachable client.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StaticState {
                pending: Vec::new(),
                active: None,
                completed: Vec::new(),
                status: ServerStatus::connected("idle", "idle"),
                console: VecDeque::new(),
                plans: Vec::new(),
                unreachable: false,
            }),
        }
    }

    /// Set the pending items.
    pub fn set_pending(&self, items: Vec<QueueItem>) {
        self.state.lock().pending = items;
    }

    /// Set the active item.
    pub fn set_active(&self, item: Option<QueueItem>) {
        self.state.lock().active = item;
    }

    /// Set the completed items.
    pub fn set_completed(&self, items: Vec<QueueItem>) {
        self.state.lock().completed = items;
    }

    /// Set the reported status.
    pub fn set_status(&self, status: ServerStatus) {
        self.state.lock().status = status;
    }

    /// Queue a line for the next console fetch.
    pub fn push_console(&self, line: impl Into<String>) {
        self.state.lock().console.push_back(line.into());
    }

    /// Set the plan catalog.
    pub fn set_plans(&self, plans: Vec<PlanDefinition>) {
        self.state.lock().plans = plans;
    }

    /// Make every request fail until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    fn check(&self) -> AppResult<()> {
        if self.state.lock().unreachable {
            return Err(GuiError::QueueClient("queue server unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueClient for StaticQueueClient {
    async fn fetch_pending(&self) -> AppResult<Vec<QueueItem>> {
        self.check()?;
        Ok(self.state.lock().pending.clone())
    }

    async fn fetch_active(&self) -> AppResult<Option<QueueItem>> {
        self.check()?;
        Ok(self.state.lock().active.clone())
    }

    async fn fetch_completed(&self) -> AppResult<Vec<QueueItem>> {
        self.check()?;
        Ok(self.state.lock().completed.clone())
    }

    async fn fetch_status(&self) -> AppResult<ServerStatus> {
        self.check()?;
        Ok(self.state.lock().status.clone())
    }

    async fn submit_item(&self, item: QueueItem) -> AppResult<()> {
        self.check()?;
        self.state.lock().pending.push(item);
        Ok(())
    }

    async fn update_item(&self, item: QueueItem) -> AppResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        match state.pending.iter_mut().find(|pending| pending.uid == item.uid) {
            Some(pending) => {
                *pending = item;
                Ok(())
            }
            None => Err(GuiError::QueueClient(format!("no pending item '{}'", item.uid))),
        }
    }

    async fn start_queue(&self) -> AppResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        if state.status.queue_running() {
            return Err(GuiError::QueueClient("queue is already running".to_string()));
        }
        state.status.queue_state = "executing_queue".to_string();
        state.status.re_state = "running".to_string();
        Ok(())
    }

    async fn stop_queue(&self) -> AppResult<()> {
        self.check()?;
        let mut state = self.state.lock();
        if !state.status.queue_running() {
            return Err(GuiError::QueueClient("queue is not running".to_string()));
        }
        state.status.stop_pending = true;
        Ok(())
    }

    async fn clear_queue(&self) -> AppResult<()> {
        self.check()?;
        self.state.lock().pending.clear();
        Ok(())
    }

    async fn fetch_console(&self) -> AppResult<Vec<String>> {
        self.check()?;
        Ok(self.state.lock().console.drain(..).collect())
    }

    async fn fetch_plans(&self) -> AppResult<Vec<PlanDefinition>> {
        self.check()?;
        Ok(self.state.lock().plans.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_client_is_empty() {
        let client = NullQueueClient;
        assert!(client.fetch_pending().await.unwrap().is_empty());
        assert!(client.fetch_active().await.unwrap().is_none());
        assert!(client.fetch_completed().await.unwrap().is_empty());
        assert!(!client.fetch_status().await.unwrap().connected);
        let item = QueueItem::new("a", "plan", "count");
        assert!(client.submit_item(item.clone()).await.is_err());
        assert!(client.update_item(item).await.is_err());
        let err = client.start_queue().await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
        assert!(client.stop_queue().await.is_err());
        assert!(client.clear_queue().await.is_err());
        assert!(client.fetch_console().await.unwrap().is_empty());
        assert!(client.fetch_plans().await.is_err());
    }

    #[tokio::test]
    async fn test_static_client_controls() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![QueueItem::new("a", "plan", "count"), QueueItem::new("b", "plan", "count")]);
        assert!(client.stop_queue().await.is_err());

        client.start_queue().await.unwrap();
        let status = client.fetch_status().await.unwrap();
        assert!(status.queue_running());
        assert!(client.start_queue().await.is_err());

        client.stop_queue().await.unwrap();
        assert!(client.fetch_status().await.unwrap().stop_pending);

        client.clear_queue().await.unwrap();
        assert!(client.fetch_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_client_updates_pending_item() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![QueueItem::new("a", "plan", "count")]);
        let edited = QueueItem::new("a", "plan", "count").with_kwarg("num", serde_json::json!(3));
        client.update_item(edited.clone()).await.unwrap();
        assert_eq!(client.fetch_pending().await.unwrap(), vec![edited]);

        let err = client.update_item(QueueItem::new("zz", "plan", "count")).await.unwrap_err();
        assert!(err.to_string().contains("zz"));
    }

    #[tokio::test]
    async fn test_static_client_console_and_plans() {
        let client = StaticQueueClient::new();
        client.push_console("Queue is empty.");
        client.push_console("RE Manager started.");
        assert_eq!(client.fetch_console().await.unwrap().len(), 2);
        assert!(client.fetch_console().await.unwrap().is_empty());

        client.set_plans(vec![PlanDefinition::new("count", "plan")]);
        assert_eq!(client.fetch_plans().await.unwrap()[0].name, "count");
    }

    #[test]
    fn test_actions_follow_status() {
        let idle = ServerStatus::connected("idle", "idle");
        assert_eq!(idle.actions(0), QueueActions { start: true, stop: false, clear: false });
        assert!(idle.actions(2).clear);

        let running = ServerStatus::connected("executing_queue", "running");
        assert_eq!(running.actions(1), QueueActions { start: false, stop: true, clear: true });

        let stopping = running.clone().with_stop_pending(true);
        assert!(!stopping.actions(1).start && !stopping.actions(1).stop);

        let closed = ServerStatus::connected("idle", "closed");
        assert!(!closed.actions(0).start);
        assert_eq!(ServerStatus::disconnected("timeout").actions(3), QueueActions::default());
    }

    #[tokio::test]
    async fn test_static_client_accepts_submissions() {
        let client = StaticQueueClient::new();
        client.submit_item(QueueItem::new("a", "plan", "count")).await.unwrap();
        assert_eq!(client.fetch_pending().await.unwrap()[0].uid, "a");
    }

    #[tokio::test]
    async fn test_static_client_unreachable() {
        let client = StaticQueueClient::new();
        client.set_pending(vec![QueueItem::new("a", "plan", "count")]);
        assert_eq!(client.fetch_pending().await.unwrap().len(), 1);

        client.set_unreachable(true);
        let err = client.fetch_pending().await.unwrap_err();
        assert!(matches!(err, GuiError::QueueClient(_)));
    }
}
