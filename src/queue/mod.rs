//! Queue server state: items, the shared snapshot model, the client capability
//! that feeds it, the table view the monitor widget renders, and the plan
//! definitions used to draft and edit items.

pub mod client;
pub mod display;
pub mod edit;
pub mod item;
pub mod model;
pub mod plan;
pub mod poller;

pub use client::{NullQueueClient, QueueActions, QueueClient, ServerStatus, StaticQueueClient};
pub use display::{ColumnSpec, QueueTable, RoiKeyMap};
pub use edit::{apply_item_edit, build_update_payload, coerce_for_key, edit_target};
pub use item::{ExitStatus, ItemResult, Partition, QueueItem};
pub use model::{Handoff, QueueSnapshot, QueueStateModel};
pub use plan::{catalog, ParamKind, PlanCatalog, PlanDefinition, PlanParameter};
pub use poller::{
    drain_console, poll_once, spawn_console_monitor, spawn_poller, PollerHandle, CONSOLE_TARGET,
    MIN_POLL_INTERVAL,
};
