//! Editing pending queue items from table text.
//!
//! The monitor edits one cell at a time. [`apply_item_edit`] writes the edited
//! text into the item's kwargs, following ROI aliases to the kwarg the item
//! actually carries, and [`build_update_payload`] turns the whole row back into
//! the item sent to the server. Plan definitions decide how text is converted;
//! keys a plan does not declare are converted like [`ParamKind::Auto`].

use super::display::{format_value, RoiKeyMap};
use super::item::QueueItem;
use super::plan::{ParamKind, PlanCatalog, PlanParameter};
use crate::error::AppResult;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Columns computed from the item rather than stored in its kwargs.
pub const READ_ONLY_COLUMNS: [&str; 10] = [
    "name", "plan", "status", "state", "scan_ids", "uid", "item_uid", "kind", "item_type", "index",
];

/// Whether a column maps to a kwarg that can be edited.
pub fn is_editable_column(column: &str) -> bool {
    !READ_ONLY_COLUMNS.contains(&column) && !column.contains('.')
}

/// Convert `text` for `key` using plan `plan_name`'s parameter definition.
pub fn coerce_for_key(catalog: &PlanCatalog, plan_name: &str, key: &str, text: &str) -> AppResult<Value> {
    match catalog.get(plan_name).and_then(|plan| plan.parameter(key)) {
        Some(parameter) => parameter.coerce(text),
        None => PlanParameter::new(key, ParamKind::Auto).coerce(text),
    }
}

/// Kwarg a column edit lands in.
///
/// A kwarg named like the column wins. ROI columns use the first alias the item
/// carries, else the first alias. `None` for read-only columns and ROI columns
/// without aliases.
pub fn edit_target(item: &QueueItem, column: &str, roi_key_map: &RoiKeyMap) -> Option<String> {
    if !is_editable_column(column) {
        return None;
    }
    let carries = |key: &str| item.kwargs().is_some_and(|kwargs| kwargs.contains_key(key));
    if carries(column) {
        return Some(column.to_string());
    }
    match roi_key_map.get(column) {
        Some(aliases) => aliases
            .iter()
            .filter(|alias| alias.as_str() != column)
            .find(|alias| carries(alias))
            .or_else(|| aliases.first())
            .cloned(),
        None => Some(column.to_string()),
    }
}

/// Write edited cell text into `item`.
///
/// Blank text removes the kwarg. Returns `Ok(false)` when the column cannot be
/// edited, and an error when the text does not convert.
pub fn apply_item_edit(
    item: &mut QueueItem,
    column: &str,
    text: &str,
    catalog: &PlanCatalog,
    roi_key_map: &RoiKeyMap,
) -> AppResult<bool> {
    let Some(key) = edit_target(item, column, roi_key_map) else {
        return Ok(false);
    };
    if text.trim().is_empty() {
        item.update_kwargs(|kwargs| kwargs.remove(&key));
        return Ok(true);
    }
    let value = coerce_for_key(catalog, &item.name, &key, text)?;
    item.update_kwargs(|kwargs| kwargs.insert(key, value));
    Ok(true)
}

/// Copy of `item` with its kwargs rebuilt from row text keyed by kwarg name.
///
/// Excluded keys are skipped and blank values remove their kwarg. Text that
/// still reads like the current value keeps that value unless the plan
/// declares the parameter.
pub fn build_update_payload(
    item: &QueueItem,
    row_values: &BTreeMap<String, String>,
    exclude: &[&str],
    catalog: &PlanCatalog,
) -> AppResult<QueueItem> {
    let plan = catalog.get(&item.name);
    let current = item.kwargs().cloned().unwrap_or_default();
    let mut updates = Map::new();
    let mut removals = Vec::new();

    for (key, text) in row_values {
        if exclude.contains(&key.as_str()) {
            continue;
        }
        if text.trim().is_empty() {
            removals.push(key.clone());
            continue;
        }
        let value = match plan.and_then(|plan| plan.parameter(key)) {
            Some(parameter) => parameter.coerce(text)?,
            None => match current.get(key) {
                Some(value) if format_value(value) == *text => value.clone(),
                _ => PlanParameter::new(key.clone(), ParamKind::Auto).coerce(text)?,
            },
        };
        updates.insert(key.clone(), value);
    }

    let mut payload = item.clone();
    payload.update_kwargs(|kwargs| {
        for key in &removals {
            kwargs.remove(key);
        }
        kwargs.extend(updates);
    });
    Ok(payload)
}
