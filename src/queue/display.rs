//! Tabular view of a queue snapshot.
//!
//! The monitor widget shows pending, active and completed items in one table.
//! Columns are the plan name, then user-configured columns, then ROI columns
//! (a display name mapped to one or more kwargs aliases), then any kwargs keys
//! discovered in the items themselves.

use super::item::{Partition, QueueItem};
use super::model::QueueSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// ROI display column → kwargs aliases, first match wins.
pub type RoiKeyMap = BTreeMap<String, Vec<String>>;

/// One user-configured column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnSpec {
    /// Field looked up in each item
    #[serde(alias = "column_id", alias = "key")]
    pub id: String,
    /// Header text; derived from `id` when absent
    #[serde(default)]
    pub label: Option<String>,
}

impl ColumnSpec {
    /// Column with a derived header.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
        }
    }

    /// Header text.
    pub fn label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => title_case(&self.id),
        }
    }
}

fn title_case(id: &str) -> String {
    id.split(['_', '.'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Column set for a snapshot, in display order and without duplicates.
pub fn collect_columns(
    snapshot: &QueueSnapshot,
    user_columns: &[ColumnSpec],
    roi_key_map: &RoiKeyMap,
) -> Vec<ColumnSpec> {
    let mut columns = vec![ColumnSpec::new("name")];
    let mut seen: HashSet<String> = HashSet::from(["name".to_string()]);

    for column in user_columns {
        if seen.insert(column.id.clone()) {
            columns.push(column.clone());
        }
    }

    // aliases are shown under their ROI column, not on their own
    let mut covered = seen.clone();
    for (roi, aliases) in roi_key_map {
        if seen.insert(roi.clone()) {
            columns.push(ColumnSpec::new(roi.clone()));
        }
        covered.insert(roi.clone());
        covered.extend(aliases.iter().cloned());
    }

    for (_, item) in snapshot.entries() {
        if let Some(kwargs) = item.kwargs() {
            for key in kwargs.keys() {
                if !covered.contains(key) && seen.insert(key.clone()) {
                    columns.push(ColumnSpec::new(key.clone()));
                }
            }
        }
    }
    columns
}

/// Render a JSON value as cell text.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(values) => values.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}={}", key, format_value(value)))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Look up a dotted path in the item, its payload, kwargs, metadata and result.
///
/// Path segments that hit an array match the first element holding that key.
pub fn extract_field(item: &QueueItem, path: &str) -> Option<Value> {
    let root = serde_json::to_value(item).ok()?;
    let candidates = [
        Some(&root),
        Some(&item.payload),
        item.payload.get("kwargs"),
        item.payload.get("metadata"),
        root.get("result"),
    ];
    let found = candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| walk(candidate, path))
        .cloned();
    found
}

fn walk<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for part in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(entries) => entries.iter().find_map(|entry| entry.get(part))?,
            _ => return None,
        };
    }
    Some(current)
}

fn roi_value(item: &QueueItem, aliases: &[String]) -> Option<Value> {
    if let Some(kwargs) = item.kwargs() {
        if let Some(value) = aliases
            .iter()
            .filter_map(|alias| kwargs.get(alias))
            .find(|value| !value.is_null())
        {
            return Some(value.clone());
        }
    }
    aliases
        .iter()
        .filter_map(|alias| extract_field(item, alias))
        .find(|value| !value.is_null())
}

/// Text for one cell.
///
/// `row_index` is zero-based; `running` marks the active item.
pub fn resolve_cell(
    column_id: &str,
    item: &QueueItem,
    row_index: usize,
    roi_key_map: &RoiKeyMap,
    running: bool,
) -> String {
    if column_id == "index" {
        return (row_index + 1).to_string();
    }
    if let Some(aliases) = roi_key_map.get(column_id) {
        if let Some(value) = roi_value(item, aliases) {
            return format_value(&value);
        }
    }
    match column_id {
        "name" | "plan" => {
            return if item.name.is_empty() {
                "Unknown".to_string()
            } else {
                item.name.clone()
            };
        }
        "state" | "status" => {
            return match item.exit_status() {
                Some(status) => status.to_string(),
                None if running => "Running".to_string(),
                None => "Pending".to_string(),
            };
        }
        "scan_ids" => {
            return item
                .result
                .as_ref()
                .map(|result| {
                    result
                        .scan_ids
                        .iter()
                        .map(u64::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
        }
        "uid" | "item_uid" => return item.uid.clone(),
        "kind" | "item_type" => return item.kind.clone(),
        _ => {}
    }
    if let Some(value) = item.kwargs().and_then(|kwargs| kwargs.get(column_id)) {
        return format_value(value);
    }
    extract_field(item, column_id)
        .map(|value| format_value(&value))
        .unwrap_or_default()
}

/// One rendered row.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRow {
    /// Partition the item came from
    pub partition: Partition,
    /// Item uid
    pub uid: String,
    /// Cell text per column
    pub cells: Vec<String>,
}

/// Table built from one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueTable {
    /// Revision of the snapshot the table was built from
    pub revision: u64,
    /// Columns in display order
    pub columns: Vec<ColumnSpec>,
    /// Pending rows, then the active row, then completed rows
    pub rows: Vec<QueueRow>,
}

impl QueueTable {
    /// Build the table for `snapshot`.
    pub fn build(snapshot: &QueueSnapshot, user_columns: &[ColumnSpec], roi_key_map: &RoiKeyMap) -> Self {
        let columns = collect_columns(snapshot, user_columns, roi_key_map);
        let rows = snapshot
            .entries()
            .enumerate()
            .map(|(index, (partition, item))| QueueRow {
                partition,
                uid: item.uid.clone(),
                cells: columns
                    .iter()
                    .map(|column| {
                        resolve_cell(
                            &column.id,
                            item,
                            index,
                            roi_key_map,
                            partition == Partition::Active,
                        )
                    })
                    .collect(),
            })
            .collect();
        Self {
            revision: snapshot.revision,
            columns,
            rows,
        }
    }

    /// Rows belonging to one partition.
    pub fn rows_in(&self, partition: Partition) -> impl Iterator<Item = &QueueRow> {
        self.rows.iter().filter(move |row| row.partition == partition)
    }
}
