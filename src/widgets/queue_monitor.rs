//! Queue monitor: pending, active and completed items in one table.
//!
//! Besides showing the queue, the monitor starts, stops and clears it, moves
//! pending items up and down locally, and edits pending items in place. Server
//! requests run on the tokio runtime; their results come back over an mpsc
//! channel drained at the start of every frame.

use super::Widget;
use crate::config::WidgetConfig;
use crate::error::{AppResult, GuiError};
use crate::queue::display::format_value;
use crate::queue::{
    apply_item_edit, build_update_payload, catalog, edit_target, poll_once, ColumnSpec, Partition,
    PlanCatalog, PlanDefinition, QueueActions, QueueClient, QueueItem, QueueSnapshot, QueueStateModel,
    QueueTable, RoiKeyMap,
};
use crate::registry::WidgetServices;
use egui_extras::{Column, TableBuilder};
use serde_json::{json, Map, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Default queue poll period.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Expand a raw ROI map; a single string stands for a one-element list.
pub fn parse_roi_key_map(
    widget: &str,
    option: &str,
    raw: &BTreeMap<String, Value>,
) -> AppResult<RoiKeyMap> {
    raw.iter()
        .map(|(column, aliases)| {
            let aliases = match aliases {
                Value::String(alias) => vec![alias.clone()],
                Value::Array(values) => values
                    .iter()
                    .map(|value| {
                        value.as_str().map(str::to_string).ok_or_else(|| {
                            GuiError::config(widget, format!("{}.{}", option, column), "aliases must be strings")
                        })
                    })
                    .collect::<AppResult<Vec<_>>>()?,
                _ => {
                    return Err(GuiError::config(
                        widget,
                        format!("{}.{}", option, column),
                        "expected a string or a list of strings",
                    ))
                }
            };
            Ok((column.clone(), aliases))
        })
        .collect()
}

/// Options of the `qserver_monitor` widget.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueMonitorOptions {
    /// Queue poll period requested from the host
    pub poll_interval_ms: u64,
    /// User columns after the name column
    pub columns: Vec<ColumnSpec>,
    /// ROI display column → kwargs aliases
    pub roi_key_map: RoiKeyMap,
}

impl Default for QueueMonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            columns: Vec::new(),
            roi_key_map: RoiKeyMap::new(),
        }
    }
}

impl QueueMonitorOptions {
    /// Parse merged options. Columns may be plain ids or `{id, label}` maps.
    pub fn from_options(widget: &str, options: &Map<String, Value>) -> AppResult<Self> {
        let mut parsed = Self::default();
        if let Some(value) = options.get("poll_interval_ms") {
            parsed.poll_interval_ms = value
                .as_u64()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| GuiError::config(widget, "poll_interval_ms", "expected a positive integer"))?;
        }
        match options.get("columns") {
            None | Some(Value::Null) => {}
            Some(Value::Array(entries)) => {
                parsed.columns = entries
                    .iter()
                    .map(|entry| match entry {
                        Value::String(id) => Ok(ColumnSpec::new(id.clone())),
                        other => serde_json::from_value(other.clone())
                            .map_err(|err| GuiError::config(widget, "columns", err.to_string())),
                    })
                    .collect::<AppResult<_>>()?;
            }
            Some(_) => return Err(GuiError::config(widget, "columns", "expected a list")),
        }
        match options.get("roi_key_map") {
            None | Some(Value::Null) => {}
            Some(Value::Object(raw)) => {
                let raw: BTreeMap<String, Value> =
                    raw.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                parsed.roi_key_map = parse_roi_key_map(widget, "roi_key_map", &raw)?;
            }
            Some(_) => return Err(GuiError::config(widget, "roi_key_map", "expected a mapping")),
        }
        Ok(parsed)
    }

    /// Normalized option map.
    pub fn to_options(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("poll_interval_ms".into(), json!(self.poll_interval_ms));
        map.insert("columns".into(), json!(self.columns));
        map.insert("roi_key_map".into(), json!(self.roi_key_map));
        map
    }
}

/// Queue-wide request sent from the monitor's buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueControl {
    /// Start executing the queue
    Start,
    /// Stop after the running item
    Stop,
    /// Remove every pending item
    Clear,
}

impl QueueControl {
    fn label(self) -> &'static str {
        match self {
            QueueControl::Start => "Start Queue",
            QueueControl::Stop => "Stop Queue",
            QueueControl::Clear => "Clear Queue",
        }
    }

    fn sent(self) -> &'static str {
        match self {
            QueueControl::Start => "Queue start request sent.",
            QueueControl::Stop => "Queue stop request sent.",
            QueueControl::Clear => "Queue cleared.",
        }
    }

    async fn send(self, client: &dyn QueueClient) -> AppResult<()> {
        match self {
            QueueControl::Start => client.start_queue().await,
            QueueControl::Stop => client.stop_queue().await,
            QueueControl::Clear => client.clear_queue().await,
        }
    }
}

#[derive(Debug)]
enum ActionResult {
    Control(QueueControl, Result<(), String>),
    ItemUpdated(String, Result<(), String>),
    PlansLoaded(Result<Vec<PlanDefinition>, String>),
}

#[derive(Debug, Clone, PartialEq)]
struct CellEdit {
    uid: String,
    column: String,
    text: String,
}

/// Live queue table.
pub struct QueueMonitorWidget {
    key: String,
    options: QueueMonitorOptions,
    model: Arc<QueueStateModel>,
    client: Arc<dyn QueueClient>,
    runtime: Option<Handle>,
    updates: watch::Receiver<Arc<QueueSnapshot>>,
    snapshot: Arc<QueueSnapshot>,
    table: QueueTable,
    rebuilds: u64,
    plans: PlanCatalog,
    editing: Option<CellEdit>,
    message: Option<Result<String, String>>,
    action_tx: mpsc::Sender<ActionResult>,
    action_rx: mpsc::Receiver<ActionResult>,
    action_in_flight: usize,
}

impl QueueMonitorWidget {
    /// Monitor bound to `model`. With a runtime the plan catalog is requested
    /// right away; without one the monitor is display-only.
    pub fn new(
        key: impl Into<String>,
        options: QueueMonitorOptions,
        model: Arc<QueueStateModel>,
        client: Arc<dyn QueueClient>,
        runtime: Option<Handle>,
    ) -> Self {
        let updates = model.subscribe();
        let snapshot = model.snapshot();
        let table = QueueTable::build(&snapshot, &options.columns, &options.roi_key_map);
        let (action_tx, action_rx) = mpsc::channel(16);
        let mut widget = Self {
            key: key.into(),
            options,
            model,
            client,
            runtime,
            updates,
            snapshot,
            table,
            rebuilds: 1,
            plans: PlanCatalog::new(),
            editing: None,
            message: None,
            action_tx,
            action_rx,
            action_in_flight: 0,
        };
        widget.request_plans();
        widget
    }

    /// Build from a resolved config.
    pub fn from_config(config: &WidgetConfig, services: &WidgetServices) -> AppResult<Self> {
        let options = QueueMonitorOptions::from_options(&config.widget_key, &config.options)?;
        Ok(Self::new(
            config.widget_key.clone(),
            options,
            services.queue_model.clone(),
            services.queue_client.clone(),
            services.runtime.clone(),
        ))
    }

    /// Pick up a newer snapshot. Returns `true` when the table was rebuilt.
    pub fn refresh(&mut self) -> bool {
        if !self.updates.has_changed().unwrap_or(false) {
            return false;
        }
        let snapshot = self.updates.borrow_and_update().clone();
        if snapshot.revision == self.table.revision {
            return false;
        }
        self.table = QueueTable::build(&snapshot, &self.options.columns, &self.options.roi_key_map);
        self.snapshot = snapshot;
        self.rebuilds += 1;
        true
    }

    /// Current table.
    pub fn table(&self) -> &QueueTable {
        &self.table
    }

    /// Number of times the table has been built.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    /// Parsed options.
    pub fn options(&self) -> &QueueMonitorOptions {
        &self.options
    }

    /// Last request outcome shown under the buttons.
    pub fn message(&self) -> Option<&Result<String, String>> {
        self.message.as_ref()
    }

    /// Plan definitions used to convert edited text.
    pub fn plans(&self) -> &PlanCatalog {
        &self.plans
    }

    /// Requests sent and not answered yet.
    pub fn in_flight(&self) -> usize {
        self.action_in_flight
    }

    /// Controls enabled for the current status and queue.
    pub fn actions(&self) -> QueueActions {
        self.model.status().actions(self.snapshot.pending.len())
    }

    /// Move a pending item to `index` in the local view.
    pub fn move_pending(&mut self, uid: &str, index: usize) -> bool {
        let moved = self.model.move_pending(uid, index);
        if moved {
            self.refresh();
        }
        moved
    }

    /// Send a queue-wide request.
    pub fn request(&mut self, control: QueueControl) {
        let model = self.model.clone();
        self.spawn_action(move |client| async move {
            let result = control.send(client.as_ref()).await;
            if result.is_ok() {
                refresh_model(client.as_ref(), &model).await;
            }
            ActionResult::Control(control, result.map_err(|err| err.to_string()))
        });
    }

    /// Item to send to the server after editing one cell of a pending row.
    ///
    /// The edit goes through [`apply_item_edit`]; the row's kwarg-backed cells
    /// are then rebuilt with [`build_update_payload`].
    pub fn prepare_edit(&self, uid: &str, column: &str, text: &str) -> AppResult<QueueItem> {
        let item = self
            .snapshot
            .pending
            .iter()
            .find(|item| item.uid == uid)
            .ok_or_else(|| GuiError::Plan("Only queued plans can be edited.".to_string()))?;
        let mut edited = item.clone();
        if !apply_item_edit(&mut edited, column, text, &self.plans, &self.options.roi_key_map)? {
            return Err(GuiError::Plan(format!("Cannot edit column '{}'.", column)));
        }
        let row_values = self.row_values(&edited);
        build_update_payload(&edited, &row_values, &["name", "status"], &self.plans)
    }

    /// Send an edited pending item to the server.
    pub fn commit_edit(&mut self, uid: &str, column: &str, text: &str) {
        let item = match self.prepare_edit(uid, column, text) {
            Ok(item) => item,
            Err(err) => {
                self.message = Some(Err(err.to_string()));
                return;
            }
        };
        let model = self.model.clone();
        let uid = uid.to_string();
        self.spawn_action(move |client| async move {
            let result = client.update_item(item).await;
            if result.is_ok() {
                refresh_model(client.as_ref(), &model).await;
            }
            ActionResult::ItemUpdated(uid, result.map_err(|err| err.to_string()))
        });
    }

    /// Cell text of every kwarg the item carries, keyed by kwarg.
    fn row_values(&self, item: &QueueItem) -> BTreeMap<String, String> {
        let Some(kwargs) = item.kwargs() else {
            return BTreeMap::new();
        };
        self.table
            .columns
            .iter()
            .filter_map(|column| edit_target(item, &column.id, &self.options.roi_key_map))
            .filter_map(|key| {
                kwargs
                    .get(&key)
                    .map(|value| (key, format_value(value)))
            })
            .collect()
    }

    fn request_plans(&mut self) {
        if self.runtime.is_none() {
            return;
        }
        self.spawn_action(|client| async move {
            ActionResult::PlansLoaded(client.fetch_plans().await.map_err(|err| err.to_string()))
        });
    }

    fn spawn_action<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(Arc<dyn QueueClient>) -> Fut,
        Fut: std::future::Future<Output = ActionResult> + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            self.message = Some(Err("no async runtime available to contact the queue server".to_string()));
            return;
        };
        let tx = self.action_tx.clone();
        let task = action(self.client.clone());
        self.action_in_flight = self.action_in_flight.saturating_add(1);
        runtime.spawn(async move {
            let _ = tx.send(task.await).await;
        });
    }

    /// Apply finished requests. Returns `true` when anything arrived.
    fn poll_results(&mut self) -> bool {
        let mut updated = false;
        loop {
            match self.action_rx.try_recv() {
                Ok(result) => {
                    self.action_in_flight = self.action_in_flight.saturating_sub(1);
                    self.handle_result(result);
                    updated = true;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
        if updated {
            self.refresh();
        }
        updated
    }

    fn handle_result(&mut self, result: ActionResult) {
        match result {
            ActionResult::Control(control, Ok(())) => {
                info!("{}", control.sent());
                self.message = Some(Ok(control.sent().to_string()));
            }
            ActionResult::Control(control, Err(err)) => {
                warn!("{} failed: {}", control.label(), err);
                self.message = Some(Err(err));
            }
            ActionResult::ItemUpdated(uid, Ok(())) => {
                info!(uid = %uid, "queue item updated");
                self.message = Some(Ok("Queue item updated.".to_string()));
            }
            ActionResult::ItemUpdated(uid, Err(err)) => {
                warn!(uid = %uid, "queue item update rejected: {}", err);
                self.message = Some(Err(err));
            }
            ActionResult::PlansLoaded(Ok(definitions)) => {
                debug!(plans = definitions.len(), "loaded plan catalog");
                self.plans = catalog(definitions);
            }
            ActionResult::PlansLoaded(Err(err)) => {
                debug!("plan catalog unavailable: {}", err);
            }
        }
    }

    fn controls_ui(&mut self, ui: &mut egui::Ui) {
        let actions = self.actions();
        ui.horizontal(|ui| {
            for (control, enabled) in [
                (QueueControl::Start, actions.start),
                (QueueControl::Stop, actions.stop),
                (QueueControl::Clear, actions.clear),
            ] {
                if ui.add_enabled(enabled, egui::Button::new(control.label())).clicked() {
                    self.request(control);
                }
            }
            if self.action_in_flight > 0 {
                ui.spinner();
            }
        });
        match &self.message {
            Some(Ok(text)) => {
                ui.colored_label(egui::Color32::GREEN, text);
            }
            Some(Err(text)) => {
                ui.colored_label(egui::Color32::RED, text);
            }
            None => {}
        }
    }

    fn pending_ui(&mut self, ui: &mut egui::Ui) {
        let rows: Vec<_> = self.table.rows_in(Partition::Pending).cloned().collect();
        ui.strong(format!("Pending ({})", rows.len()));
        if rows.is_empty() {
            ui.weak("Empty");
            return;
        }
        let columns = self.table.columns.clone();
        let last = rows.len() - 1;
        let mut moved = None;
        let mut commit = None;
        ui.push_id("pending", |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .vscroll(false)
                .column(Column::exact(44.0))
                .columns(Column::auto().at_least(60.0), columns.len())
                .header(20.0, |mut header| {
                    header.col(|_| {});
                    for column in &columns {
                        header.col(|ui| {
                            ui.strong(column.label());
                        });
                    }
                })
                .body(|mut body| {
                    for (index, row) in rows.iter().enumerate() {
                        body.row(20.0, |mut table_row| {
                            table_row.col(|ui| {
                                if ui.add_enabled(index > 0, egui::Button::new("⏶").small()).clicked() {
                                    moved = Some((row.uid.clone(), index - 1));
                                }
                                if ui.add_enabled(index < last, egui::Button::new("⏷").small()).clicked() {
                                    moved = Some((row.uid.clone(), index + 1));
                                }
                            });
                            for (column, cell) in columns.iter().zip(&row.cells) {
                                table_row.col(|ui| {
                                    let editing = self
                                        .editing
                                        .as_mut()
                                        .filter(|edit| edit.uid == row.uid && edit.column == column.id);
                                    match editing {
                                        Some(edit) => {
                                            let response = ui.text_edit_singleline(&mut edit.text);
                                            if response.lost_focus() {
                                                if ui.input(|input| input.key_pressed(egui::Key::Enter)) {
                                                    commit = Some(edit.clone());
                                                }
                                                self.editing = None;
                                            } else {
                                                response.request_focus();
                                            }
                                        }
                                        None => {
                                            let label = ui.add(egui::Label::new(cell).sense(egui::Sense::click()));
                                            if label.double_clicked() {
                                                self.editing = Some(CellEdit {
                                                    uid: row.uid.clone(),
                                                    column: column.id.clone(),
                                                    text: cell.clone(),
                                                });
                                            }
                                        }
                                    }
                                });
                            }
                        });
                    }
                });
        });
        if let Some((uid, index)) = moved {
            self.move_pending(&uid, index);
        }
        if let Some(edit) = commit {
            self.commit_edit(&edit.uid, &edit.column, &edit.text);
        }
    }

    fn section(&self, ui: &mut egui::Ui, title: &str, partition: Partition) {
        let rows: Vec<_> = self.table.rows_in(partition).collect();
        ui.strong(format!("{} ({})", title, rows.len()));
        if rows.is_empty() {
            ui.weak("Empty");
            return;
        }
        let columns = &self.table.columns;
        ui.push_id(title, |ui| {
            TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .vscroll(false)
                .columns(Column::auto().at_least(60.0), columns.len())
                .header(20.0, |mut header| {
                    for column in columns {
                        header.col(|ui| {
                            ui.strong(column.label());
                        });
                    }
                })
                .body(|mut body| {
                    for row in rows {
                        body.row(18.0, |mut table_row| {
                            for cell in &row.cells {
                                table_row.col(|ui| {
                                    ui.label(cell);
                                });
                            }
                        });
                    }
                });
        });
    }
}

async fn refresh_model(client: &dyn QueueClient, model: &QueueStateModel) {
    if let Err(err) = poll_once(client, model).await {
        warn!("queue refresh after request failed: {}", err);
    }
}

impl Widget for QueueMonitorWidget {
    fn key(&self) -> &str {
        &self.key
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        if self.poll_results() || self.action_in_flight > 0 {
            ui.ctx().request_repaint();
        }
        self.refresh();

        let status = self.model.status();
        ui.horizontal(|ui| {
            ui.heading("Queue");
            let (color, text) = if status.connected {
                (egui::Color32::GREEN, format!("{} / {}", status.queue_state, status.re_state))
            } else {
                (egui::Color32::GRAY, "disconnected".to_string())
            };
            ui.colored_label(color, text);
        });
        self.controls_ui(ui);
        ui.separator();

        egui::ScrollArea::vertical()
            .id_salt("queue_monitor")
            .show(ui, |ui| {
                self.pending_ui(ui);
                ui.add_space(8.0);
                self.section(ui, "Running", Partition::Active);
                if let Some(progress) = self.snapshot.active_progress {
                    ui.add(
                        egui::ProgressBar::new(f32::from(progress) / 100.0)
                            .text(format!("{}%", progress)),
                    );
                }
                ui.add_space(8.0);
                self.section(ui, "History", Partition::Completed);
            });
    }

    fn summary(&self) -> Vec<String> {
        vec![
            format!("poll interval: {} ms", self.options.poll_interval_ms),
            format!(
                "columns: {}",
                self.table
                    .columns
                    .iter()
                    .map(|column| column.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ]
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(self.options.poll_interval_ms))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{NullQueueClient, ParamKind, PlanParameter, ServerStatus, StaticQueueClient};

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_parse_columns_and_roi() {
        let parsed = QueueMonitorOptions::from_options(
            "qserver_monitor",
            &options(json!({
                "poll_interval_ms": 500,
                "columns": ["status", {"id": "scan_ids", "label": "Scans"}],
                "roi_key_map": {"roi": "roi_num", "det": ["detector", "dets"]}
            })),
        )
        .unwrap();
        assert_eq!(parsed.poll_interval_ms, 500);
        assert_eq!(parsed.columns[1].label(), "Scans");
        assert_eq!(parsed.roi_key_map["roi"], vec!["roi_num"]);
        assert_eq!(parsed.roi_key_map["det"].len(), 2);

        let again = QueueMonitorOptions::from_options("qserver_monitor", &parsed.to_options()).unwrap();
        assert_eq!(again, parsed);
    }

    #[test]
    fn test_bad_shapes_rejected() {
        let err = QueueMonitorOptions::from_options("m", &options(json!({"columns": "status"})))
            .unwrap_err();
        assert!(matches!(err, GuiError::ConfigValidation { option, .. } if option == "columns"));

        let err = QueueMonitorOptions::from_options("m", &options(json!({"roi_key_map": {"roi": 3}})))
            .unwrap_err();
        assert!(err.to_string().contains("roi_key_map.roi"));

        assert!(QueueMonitorOptions::from_options("m", &options(json!({"poll_interval_ms": 0}))).is_err());
    }

    fn display_only(model: Arc<QueueStateModel>) -> QueueMonitorWidget {
        QueueMonitorWidget::new(
            "qserver_monitor",
            QueueMonitorOptions::default(),
            model,
            Arc::new(NullQueueClient),
            None,
        )
    }

    fn pending_uids(widget: &QueueMonitorWidget) -> Vec<String> {
        widget
            .table()
            .rows_in(Partition::Pending)
            .map(|row| row.uid.clone())
            .collect()
    }

    async fn settle(widget: &mut QueueMonitorWidget) {
        for _ in 0..200 {
            widget.poll_results();
            if widget.in_flight() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue requests did not finish");
    }

    async fn connected_monitor(client: Arc<StaticQueueClient>, options: QueueMonitorOptions) -> QueueMonitorWidget {
        let model = Arc::new(QueueStateModel::new());
        poll_once(client.as_ref(), &model).await.unwrap();
        let mut widget = QueueMonitorWidget::new(
            "qserver_monitor",
            options,
            model,
            client,
            Some(Handle::current()),
        );
        settle(&mut widget).await;
        widget
    }

    #[test]
    fn test_refresh_only_on_new_revision() {
        let model = Arc::new(QueueStateModel::new());
        let mut widget = display_only(model.clone());
        assert!(!widget.refresh());

        model.update_queue(vec![QueueItem::new("a", "plan", "count")]).unwrap();
        assert!(widget.refresh());
        assert_eq!(widget.table().rows.len(), 1);
        assert_eq!(widget.rebuilds(), 2);

        // identical update is not published
        model.update_queue(vec![QueueItem::new("a", "plan", "count")]).unwrap();
        assert!(!widget.refresh());
        assert_eq!(widget.rebuilds(), 2);
    }

    #[test]
    fn test_move_pending_reorders_table() {
        let model = Arc::new(QueueStateModel::new());
        model
            .update_queue(["a", "b", "c"].map(|uid| QueueItem::new(uid, "plan", "count")).to_vec())
            .unwrap();
        let mut widget = display_only(model);
        widget.refresh();

        assert!(widget.move_pending("c", 0));
        assert_eq!(pending_uids(&widget), vec!["c", "a", "b"]);
        assert!(widget.move_pending("c", 9));
        assert_eq!(pending_uids(&widget), vec!["a", "b", "c"]);
        assert!(!widget.move_pending("zz", 0));
    }

    #[test]
    fn test_requests_need_a_runtime() {
        let mut widget = display_only(Arc::new(QueueStateModel::new()));
        widget.request(QueueControl::Start);
        assert_eq!(widget.in_flight(), 0);
        assert!(matches!(widget.message(), Some(Err(text)) if text.contains("runtime")));
    }

    #[tokio::test]
    async fn test_start_stop_and_clear_queue() {
        let client = Arc::new(StaticQueueClient::new());
        client.set_status(ServerStatus::connected("idle", "idle"));
        client.set_pending(vec![QueueItem::new("a", "plan", "count"), QueueItem::new("b", "plan", "count")]);
        let mut widget = connected_monitor(client.clone(), QueueMonitorOptions::default()).await;
        assert_eq!(widget.actions(), QueueActions { start: true, stop: false, clear: true });

        widget.request(QueueControl::Start);
        settle(&mut widget).await;
        assert_eq!(widget.message(), Some(&Ok("Queue start request sent.".to_string())));
        assert_eq!(widget.actions(), QueueActions { start: false, stop: true, clear: true });

        widget.request(QueueControl::Stop);
        settle(&mut widget).await;
        assert_eq!(widget.message(), Some(&Ok("Queue stop request sent.".to_string())));
        // a requested stop disables both start and stop
        assert_eq!(widget.actions(), QueueActions { start: false, stop: false, clear: true });

        widget.request(QueueControl::Clear);
        settle(&mut widget).await;
        assert_eq!(widget.message(), Some(&Ok("Queue cleared.".to_string())));
        assert!(pending_uids(&widget).is_empty());
        assert!(!widget.actions().clear);
    }

    #[tokio::test]
    async fn test_read_only_client_reports_refusal() {
        let model = Arc::new(QueueStateModel::new());
        let mut widget = QueueMonitorWidget::new(
            "qserver_monitor",
            QueueMonitorOptions::default(),
            model,
            Arc::new(NullQueueClient),
            Some(Handle::current()),
        );
        widget.request(QueueControl::Clear);
        settle(&mut widget).await;
        assert!(matches!(widget.message(), Some(Err(text)) if text.contains("read-only")));
        assert!(widget.plans().is_empty());
    }

    #[tokio::test]
    async fn test_edit_pending_item() {
        let client = Arc::new(StaticQueueClient::new());
        client.set_status(ServerStatus::connected("idle", "idle"));
        client.set_plans(vec![PlanDefinition::new("fly2d", "plan")
            .with_parameter(PlanParameter::new("roi", ParamKind::Int))]);
        client.set_pending(vec![QueueItem::new("p1", "plan", "fly2d")
            .with_kwarg("roi", json!(1))
            .with_kwarg("dwell", json!(0.5))]);
        client.set_active(Some(QueueItem::new("r1", "plan", "fly2d")));
        let options = QueueMonitorOptions {
            columns: vec![ColumnSpec::new("dwell")],
            roi_key_map: BTreeMap::from([("ROI".to_string(), vec!["roi_num".to_string(), "roi".to_string()])]),
            ..QueueMonitorOptions::default()
        };
        let mut widget = connected_monitor(client.clone(), options).await;
        assert!(widget.plans().contains_key("fly2d"));

        let err = widget.prepare_edit("p1", "ROI", "four").unwrap_err();
        assert!(err.to_string().contains("roi"));
        let err = widget.prepare_edit("r1", "ROI", "4").unwrap_err();
        assert!(err.to_string().contains("Only queued plans can be edited."));
        let err = widget.prepare_edit("p1", "name", "count").unwrap_err();
        assert!(err.to_string().contains("Cannot edit column 'name'."));

        widget.commit_edit("p1", "ROI", "4");
        settle(&mut widget).await;
        assert_eq!(widget.message(), Some(&Ok("Queue item updated.".to_string())));
        let pending = client.fetch_pending().await.unwrap();
        let kwargs = pending[0].kwargs().unwrap();
        assert_eq!(kwargs["roi"], json!(4));
        assert_eq!(kwargs["dwell"], json!(0.5));
        assert!(!kwargs.contains_key("roi_num"));
    }
}
