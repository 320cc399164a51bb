//! Queue items as delivered by the queue server.
//!
//! Items are opaque to this crate: besides the identifier, a kind tag and a
//! display name, everything the server sends is kept in `payload` untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

fn default_kind() -> String {
    "plan".to_string()
}

/// One queueable unit of work (a plan or an instruction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier assigned by the queue server
    #[serde(alias = "item_uid")]
    pub uid: String,
    /// Kind tag (e.g. "plan", "instruction")
    #[serde(default = "default_kind", alias = "item_type")]
    pub kind: String,
    /// Plan name
    #[serde(default)]
    pub name: String,
    /// Opaque structured data (args, kwargs, metadata, ...)
    #[serde(default)]
    pub payload: Value,
    /// Execution result, present once the item has finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ItemResult>,
}

impl QueueItem {
    /// Create an item with an empty payload.
    pub fn new(uid: impl Into<String>, kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            kind: kind.into(),
            name: name.into(),
            payload: Value::Null,
            result: None,
        }
    }

    /// Replace the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Set a single keyword argument in `payload.kwargs`.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.update_kwargs(|kwargs| {
            kwargs.insert(key, value);
        });
        self
    }

    /// Edit `payload.kwargs` in place, creating it when missing.
    pub fn update_kwargs<R>(&mut self, edit: impl FnOnce(&mut Map<String, Value>) -> R) -> R {
        let mut kwargs = match self.payload.get_mut("kwargs").map(Value::take) {
            Some(Value::Object(kwargs)) => kwargs,
            _ => Map::new(),
        };
        let result = edit(&mut kwargs);
        if !self.payload.is_object() {
            self.payload = Value::Object(Map::new());
        }
        self.payload["kwargs"] = Value::Object(kwargs);
        result
    }

    /// Attach a result.
    pub fn with_result(mut self, result: ItemResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Keyword arguments, if the payload carries any.
    pub fn kwargs(&self) -> Option<&Map<String, Value>> {
        self.payload.get("kwargs").and_then(Value::as_object)
    }

    /// Exit status, if the item has finished.
    pub fn exit_status(&self) -> Option<&ExitStatus> {
        self.result.as_ref().map(|r| &r.exit_status)
    }

    /// Mark the item as finished unless the server already supplied a result.
    pub(crate) fn finished(mut self, status: ExitStatus) -> Self {
        if self.result.is_none() {
            self.result = Some(ItemResult::new(status));
        }
        self
    }
}

/// Result attached to a completed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    /// How the item left the active slot
    pub exit_status: ExitStatus,
    /// Scan ids produced by the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scan_ids: Vec<u64>,
    /// Free-form server message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,
}

impl ItemResult {
    /// Result with the given status and no scan ids.
    pub fn new(exit_status: ExitStatus) -> Self {
        Self {
            exit_status,
            scan_ids: Vec::new(),
            msg: String::new(),
        }
    }
}

/// Terminal status of a finished item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Ran to the end
    Completed,
    /// Replaced by the next item before it finished
    Preempted,
    /// Raised an error
    Failed,
    /// Aborted by the operator
    Aborted,
    /// Stopped cleanly by the operator
    Stopped,
    /// Halted without cleanup
    Halted,
    /// Any status this client does not know
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExitStatus::Completed => "completed",
            ExitStatus::Preempted => "preempted",
            ExitStatus::Failed => "failed",
            ExitStatus::Aborted => "aborted",
            ExitStatus::Stopped => "stopped",
            ExitStatus::Halted => "halted",
            ExitStatus::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// The three parts of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Waiting to run
    Pending,
    /// Running now
    Active,
    /// Finished, oldest first
    Completed,
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Pending => f.write_str("pending"),
            Partition::Active => f.write_str("active"),
            Partition::Completed => f.write_str("completed"),
        }
    }
}
