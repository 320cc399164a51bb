//! Plan editor: pick a plan definition, fill its parameters, queue a draft.
//!
//! Submissions and catalog refreshes run on the tokio runtime and report back
//! over an mpsc channel that [`PlanEditor::ui`] drains every frame.

use super::queue_monitor::parse_roi_key_map;
use crate::error::{AppResult, GuiError};
use crate::queue::{PlanDefinition, PlanParameter, QueueClient, QueueItem, RoiKeyMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

fn enabled() -> bool {
    true
}

fn default_kinds() -> Vec<String> {
    vec!["plan".to_string(), "instruction".to_string()]
}

fn default_slot() -> String {
    "plan_editor".to_string()
}

/// `plan_editor` section of the scan setup options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEditorOptions {
    /// Defaults to on once the section is present
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Kind tabs, in display order
    #[serde(default = "default_kinds")]
    pub kinds: Vec<String>,
    /// Seed definitions
    #[serde(default)]
    pub plans: Vec<PlanDefinition>,
    /// ROI column aliases shared with the queue monitor
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub roi_key_map: BTreeMap<String, Value>,
    /// Component name in the pane layout
    #[serde(default = "default_slot")]
    pub layout_slot: String,
}

impl Default for PlanEditorOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            kinds: default_kinds(),
            plans: Vec::new(),
            roi_key_map: BTreeMap::new(),
            layout_slot: default_slot(),
        }
    }
}

impl PlanEditorOptions {
    /// Check nested shapes.
    pub fn validate(&self, widget: &str) -> AppResult<()> {
        if self.kinds.is_empty() {
            return Err(GuiError::config(widget, "plan_editor.kinds", "at least one kind is required"));
        }
        for plan in &self.plans {
            if !self.kinds.contains(&plan.kind) {
                return Err(GuiError::config(
                    widget,
                    "plan_editor.plans",
                    format!("plan '{}' has kind '{}' which is not listed in kinds", plan.name, plan.kind),
                ));
            }
        }
        self.roi_keys(widget).map(|_| ())
    }

    /// ROI map with single strings expanded to one-element lists.
    pub fn roi_keys(&self, widget: &str) -> AppResult<RoiKeyMap> {
        parse_roi_key_map(widget, "plan_editor.roi_key_map", &self.roi_key_map)
    }
}

#[derive(Debug)]
enum EditorResult {
    Submitted(String, Result<(), String>),
    PlansLoaded(Result<Vec<PlanDefinition>, String>),
}

/// Plan editor panel.
pub struct PlanEditor {
    kinds: Vec<String>,
    definitions: BTreeMap<String, Vec<PlanDefinition>>,
    kind_index: usize,
    plan_index: usize,
    values: BTreeMap<String, String>,
    client: Arc<dyn QueueClient>,
    runtime: Option<Handle>,
    message: Option<Result<String, String>>,
    action_tx: mpsc::Sender<EditorResult>,
    action_rx: mpsc::Receiver<EditorResult>,
    action_in_flight: usize,
}

impl std::fmt::Debug for PlanEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanEditor")
            .field("kinds", &self.kinds)
            .field("plans", &self.definitions.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

impl PlanEditor {
    /// Editor seeded with the configured plans.
    pub fn new(options: &PlanEditorOptions, client: Arc<dyn QueueClient>, runtime: Option<Handle>) -> Self {
        let (action_tx, action_rx) = mpsc::channel(16);
        let mut editor = Self {
            kinds: options.kinds.clone(),
            definitions: options.kinds.iter().map(|kind| (kind.clone(), Vec::new())).collect(),
            kind_index: 0,
            plan_index: 0,
            values: BTreeMap::new(),
            client,
            runtime,
            message: None,
            action_tx,
            action_rx,
            action_in_flight: 0,
        };
        editor.load_definitions(options.plans.iter().cloned());
        editor
    }

    /// Add definitions under their kinds.
    pub fn load_definitions(&mut self, definitions: impl IntoIterator<Item = PlanDefinition>) {
        for definition in definitions {
            self.definitions
                .entry(definition.kind.clone())
                .or_default()
                .push(definition);
        }
        self.reset_values();
    }

    /// Definitions of the selected kind.
    pub fn definitions(&self) -> &[PlanDefinition] {
        self.kinds
            .get(self.kind_index)
            .and_then(|kind| self.definitions.get(kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Selected definition.
    pub fn current_plan(&self) -> Option<&PlanDefinition> {
        self.definitions().get(self.plan_index)
    }

    /// Select a kind by name.
    pub fn select_kind(&mut self, kind: &str) -> bool {
        match self.kinds.iter().position(|k| k == kind) {
            Some(index) => {
                self.kind_index = index;
                self.plan_index = 0;
                self.reset_values();
                true
            }
            None => false,
        }
    }

    /// Select a plan of the current kind by name.
    pub fn select_plan(&mut self, name: &str) -> bool {
        match self.definitions().iter().position(|plan| plan.name == name) {
            Some(index) => {
                self.plan_index = index;
                self.reset_values();
                true
            }
            None => false,
        }
    }

    /// Set the text of one parameter.
    pub fn set_value(&mut self, name: &str, text: impl Into<String>) {
        self.values.insert(name.to_string(), text.into());
    }

    /// Restore default texts for the selected plan.
    pub fn reset_values(&mut self) {
        self.values = self
            .current_plan()
            .map(|plan| {
                plan.parameters
                    .iter()
                    .map(|parameter| (parameter.name.clone(), parameter.default_text()))
                    .collect()
            })
            .unwrap_or_default();
    }

    /// Queue item for the selected plan and current texts.
    pub fn draft(&self) -> AppResult<QueueItem> {
        let plan = self
            .current_plan()
            .ok_or_else(|| GuiError::Plan("no plan selected".to_string()))?;
        plan.draft(&self.values)
    }

    /// Replace the definitions of every kind the server reported, keeping the
    /// selected plan when it is still offered.
    pub fn replace_definitions(&mut self, definitions: Vec<PlanDefinition>) {
        let selected = self.current_plan().map(|plan| plan.name.clone());
        let mut by_kind: BTreeMap<String, Vec<PlanDefinition>> = BTreeMap::new();
        for definition in definitions {
            by_kind.entry(definition.kind.clone()).or_default().push(definition);
        }
        self.definitions.extend(by_kind);
        self.plan_index = selected
            .and_then(|name| self.definitions().iter().position(|plan| plan.name == name))
            .unwrap_or(0);
        self.reset_values();
    }

    /// Last submission or refresh outcome.
    pub fn message(&self) -> Option<&Result<String, String>> {
        self.message.as_ref()
    }

    /// Requests sent and not answered yet.
    pub fn in_flight(&self) -> usize {
        self.action_in_flight
    }

    /// Queue the current draft.
    ///
    /// The message reads `Submitting...` until the server answers.
    pub fn submit(&mut self) {
        let item = match self.draft() {
            Ok(item) => item,
            Err(err) => {
                self.message = Some(Err(err.to_string()));
                return;
            }
        };
        let name = item.name.clone();
        if self.spawn_action(move |client| async move {
            let result = client.submit_item(item).await.map_err(|err| err.to_string());
            EditorResult::Submitted(name, result)
        }) {
            self.message = Some(Ok("Submitting...".to_string()));
        }
    }

    /// Fetch the server's plan catalog.
    pub fn refresh_from_client(&mut self) {
        if self.spawn_action(|client| async move {
            EditorResult::PlansLoaded(client.fetch_plans().await.map_err(|err| err.to_string()))
        }) {
            self.message = Some(Ok("Loading plans...".to_string()));
        }
    }

    fn spawn_action<F, Fut>(&mut self, action: F) -> bool
    where
        F: FnOnce(Arc<dyn QueueClient>) -> Fut,
        Fut: std::future::Future<Output = EditorResult> + Send + 'static,
    {
        let Some(runtime) = &self.runtime else {
            self.message = Some(Err("no async runtime available to contact the queue server".to_string()));
            return false;
        };
        let tx = self.action_tx.clone();
        let task = action(self.client.clone());
        self.action_in_flight = self.action_in_flight.saturating_add(1);
        runtime.spawn(async move {
            let _ = tx.send(task.await).await;
        });
        true
    }

    /// Apply finished requests. Returns `true` when anything arrived.
    pub fn poll_results(&mut self) -> bool {
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
        updated
    }

    fn handle_result(&mut self, result: EditorResult) {
        match result {
            EditorResult::Submitted(name, Ok(())) => {
                info!("queued plan '{}'", name);
                self.message = Some(Ok(format!("Queued '{}'", name)));
            }
            EditorResult::Submitted(name, Err(err)) => {
                warn!("failed to queue plan '{}': {}", name, err);
                self.message = Some(Err(err));
            }
            EditorResult::PlansLoaded(Ok(definitions)) => {
                debug!(plans = definitions.len(), "refreshed plan catalog");
                let count = definitions.len();
                self.replace_definitions(definitions);
                self.message = Some(Ok(format!("Loaded {} plans", count)));
            }
            EditorResult::PlansLoaded(Err(err)) => {
                warn!("failed to load plans: {}", err);
                self.message = Some(Err(err));
            }
        }
    }

    /// Draw the editor.
    pub fn ui(&mut self, ui: &mut egui::Ui) {
        if self.poll_results() || self.action_in_flight > 0 {
            ui.ctx().request_repaint();
        }
        ui.heading("Bluesky Plan");

        ui.horizontal(|ui| {
            let mut kind_index = self.kind_index;
            for (index, kind) in self.kinds.iter().enumerate() {
                ui.radio_value(&mut kind_index, index, kind.replace('_', " "));
            }
            if kind_index != self.kind_index {
                self.kind_index = kind_index;
                self.plan_index = 0;
                self.reset_values();
            }

            ui.add_space(12.0);
            ui.label("Available:");
            let mut plan_index = self.plan_index;
            let selected = self
                .current_plan()
                .map(|plan| plan.name.clone())
                .unwrap_or_default();
            egui::ComboBox::from_id_salt("plan_editor_plan")
                .selected_text(selected)
                .show_ui(ui, |ui| {
                    for (index, plan) in self.definitions().iter().enumerate() {
                        let label = match &plan.description {
                            Some(description) => format!("{} - {}", plan.name, description),
                            None => plan.name.clone(),
                        };
                        ui.selectable_value(&mut plan_index, index, label);
                    }
                });
            if plan_index != self.plan_index {
                self.plan_index = plan_index;
                self.reset_values();
            }
        });

        ui.separator();

        let parameters: Vec<PlanParameter> = self
            .current_plan()
            .map(|plan| plan.parameters.clone())
            .unwrap_or_default();
        if parameters.is_empty() {
            ui.label("No parameters.");
        } else {
            egui::Grid::new("plan_editor_parameters")
                .num_columns(2)
                .striped(true)
                .show(ui, |ui| {
                    ui.strong("Parameter");
                    ui.strong("Value");
                    ui.end_row();
                    for parameter in &parameters {
                        let label = if parameter.required {
                            format!("{} *", parameter.name)
                        } else {
                            parameter.name.clone()
                        };
                        let response = ui.label(label);
                        if let Some(description) = &parameter.description {
                            let _ = response.on_hover_text(description);
                        }
                        let value = self.values.entry(parameter.name.clone()).or_default();
                        let _ = ui.text_edit_singleline(value);
                        ui.end_row();
                    }
                });
        }

        ui.horizontal(|ui| {
            if ui.button("Add to Queue").clicked() {
                self.submit();
            }
            if ui.button("Reset").clicked() {
                self.reset_values();
                self.message = None;
            }
            if ui.button("Refresh Plans").clicked() {
                self.refresh_from_client();
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
}
