//! Grid arrangement for tabs and pane components.
//!
//! Entries with an explicit row or column go to that cell. The rest are
//! stacked top to bottom below everything placed so far, ordered by their
//! `order` key and then by declaration.

use crate::config::{Placement, MAX_GRID_INDEX, MAX_GRID_SPAN};
use std::collections::BTreeMap;

/// One placed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    /// Index of the entry in the input sequence
    pub index: usize,
    /// Entry name
    pub name: String,
    /// Top row
    pub row: u32,
    /// Left column
    pub column: u32,
    /// Rows covered
    pub row_span: u32,
    /// Columns covered
    pub column_span: u32,
}

impl GridCell {
    fn bottom(&self) -> u32 {
        self.row.saturating_add(self.row_span)
    }

    fn right(&self) -> u32 {
        self.column.saturating_add(self.column_span)
    }
}

/// Placed entries plus row/column stretch factors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridLayout {
    cells: Vec<GridCell>,
    row_stretch: BTreeMap<u32, u32>,
    column_stretch: BTreeMap<u32, u32>,
}

impl GridLayout {
    /// Place named entries.
    pub fn arrange<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Placement)>,
        S: Into<String>,
    {
        let entries: Vec<(String, Placement)> = entries
            .into_iter()
            .map(|(name, placement)| (name.into(), placement))
            .collect();

        let mut cells: Vec<GridCell> = Vec::with_capacity(entries.len());
        let mut stacked: Vec<usize> = Vec::new();
        for (index, (name, placement)) in entries.iter().enumerate() {
            if placement.is_explicit() {
                cells.push(GridCell {
                    index,
                    name: name.clone(),
                    row: placement.row.unwrap_or(0).min(MAX_GRID_INDEX),
                    column: placement.column.unwrap_or(0).min(MAX_GRID_INDEX),
                    row_span: placement.row_span.clamp(1, MAX_GRID_SPAN),
                    column_span: placement.column_span.clamp(1, MAX_GRID_SPAN),
                });
            } else {
                stacked.push(index);
            }
        }

        // stable: equal order keys keep declaration order
        stacked.sort_by_key(|&index| entries[index].1.order.unwrap_or(0));
        for index in stacked {
            let (name, placement) = &entries[index];
            let row = cells.iter().map(GridCell::bottom).max().unwrap_or(0);
            cells.push(GridCell {
                index,
                name: name.clone(),
                row,
                column: 0,
                row_span: placement.row_span.clamp(1, MAX_GRID_SPAN),
                column_span: placement.column_span.clamp(1, MAX_GRID_SPAN),
            });
        }

        cells.sort_by_key(|cell| (cell.row, cell.column, cell.index));
        Self {
            cells,
            row_stretch: BTreeMap::new(),
            column_stretch: BTreeMap::new(),
        }
    }

    /// Set row stretch factors (row index → weight).
    pub fn with_row_stretch(mut self, stretch: BTreeMap<u32, u32>) -> Self {
        self.row_stretch = stretch;
        self
    }

    /// Set column stretch factors (column index → weight).
    pub fn with_column_stretch(mut self, stretch: BTreeMap<u32, u32>) -> Self {
        self.column_stretch = stretch;
        self
    }

    /// Cells ordered by row, then column.
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Cell of a named entry.
    pub fn cell(&self, name: &str) -> Option<&GridCell> {
        self.cells.iter().find(|cell| cell.name == name)
    }

    /// Number of rows spanned by all cells.
    pub fn rows(&self) -> u32 {
        self.cells.iter().map(GridCell::bottom).max().unwrap_or(0)
    }

    /// Number of columns spanned by all cells.
    pub fn columns(&self) -> u32 {
        self.cells.iter().map(GridCell::right).max().unwrap_or(0)
    }

    /// Stretch weight of a row. Rows without a factor get 1.
    pub fn row_weight(&self, row: u32) -> u32 {
        self.row_stretch.get(&row).copied().unwrap_or(1)
    }

    /// Stretch weight of a column. Columns without a factor get 1.
    pub fn column_weight(&self, column: u32) -> u32 {
        self.column_stretch.get(&column).copied().unwrap_or(1)
    }

    /// Rectangles of every cell inside `area`, in [`cells`](Self::cells) order.
    ///
    /// Space is shared out by stretch weight. When every weight on an axis is
    /// zero the space is shared evenly.
    pub fn cell_rects(&self, area: egui::Rect, spacing: f32) -> Vec<egui::Rect> {
        let rows = offsets(
            area.top(),
            area.height(),
            spacing,
            &(0..self.rows()).map(|row| self.row_weight(row)).collect::<Vec<_>>(),
        );
        let columns = offsets(
            area.left(),
            area.width(),
            spacing,
            &(0..self.columns())
                .map(|column| self.column_weight(column))
                .collect::<Vec<_>>(),
        );
        self.cells
            .iter()
            .map(|cell| {
                let (top, _) = rows[cell.row as usize];
                let (_, bottom) = rows[(cell.bottom() - 1) as usize];
                let (left, _) = columns[cell.column as usize];
                let (_, right) = columns[(cell.right() - 1) as usize];
                egui::Rect::from_min_max(egui::pos2(left, top), egui::pos2(right, bottom))
            })
            .collect()
    }

    /// Draw every cell into its share of the available space.
    pub fn show(&self, ui: &mut egui::Ui, mut add_contents: impl FnMut(&mut egui::Ui, &GridCell)) {
        let area = ui.available_rect_before_wrap();
        let spacing = ui.spacing().item_spacing.x;
        for (cell, rect) in self.cells.iter().zip(self.cell_rects(area, spacing)) {
            ui.allocate_new_ui(egui::UiBuilder::new().max_rect(rect), |ui| {
                ui.push_id(("grid_cell", cell.name.as_str()), |ui| {
                    egui::ScrollArea::both()
                        .id_salt(("grid_scroll", cell.name.as_str()))
                        .auto_shrink([false; 2])
                        .show(ui, |ui| add_contents(ui, cell));
                });
            });
        }
        ui.allocate_rect(area, egui::Sense::hover());
    }
}

/// Start and end of each track along one axis.
fn offsets(start: f32, length: f32, spacing: f32, weights: &[u32]) -> Vec<(f32, f32)> {
    if weights.is_empty() {
        return Vec::new();
    }
    let gaps = spacing * (weights.len() - 1) as f32;
    let usable = (length - gaps).max(0.0);
    let total: u64 = weights.iter().map(|&weight| u64::from(weight)).sum();
    let mut position = start;
    weights
        .iter()
        .map(|&weight| {
            let share = if total == 0 {
                usable / weights.len() as f32
            } else {
                (f64::from(usable) * f64::from(weight) / total as f64) as f32
            };
            let track = (position, position + share);
            position += share + spacing;
            track
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked(order: Option<i32>) -> Placement {
        Placement {
            order,
            ..Placement::default()
        }
    }

    #[test]
    fn test_stacks_in_declaration_order() {
        let layout = GridLayout::arrange([
            ("a", Placement::default()),
            ("b", Placement::default()),
            ("c", Placement::default()),
        ]);
        let rows: Vec<_> = layout.cells().iter().map(|cell| (cell.name.as_str(), cell.row)).collect();
        assert_eq!(rows, vec![("a", 0), ("b", 1), ("c", 2)]);
        assert_eq!(layout.columns(), 1);
    }

    #[test]
    fn test_explicit_cells_and_stacking_below() {
        let wide = Placement {
            column_span: 2,
            ..Placement::at(0, 0)
        };
        let layout = GridLayout::arrange([
            ("extra", Placement::default()),
            ("loader_panel", wide),
            ("canvas", Placement { column_span: 2, ..Placement::at(1, 0) }),
        ]);
        assert_eq!(layout.cell("loader_panel").unwrap().row, 0);
        assert_eq!(layout.cell("canvas").unwrap().row, 1);
        assert_eq!(layout.cell("extra").unwrap().row, 2);
        assert_eq!(layout.columns(), 2);
        assert_eq!(layout.rows(), 3);
    }

    #[test]
    fn test_order_key() {
        let layout = GridLayout::arrange([("a", stacked(Some(2))), ("b", stacked(Some(1))), ("c", stacked(None))]);
        let names: Vec<_> = layout.cells().iter().map(|cell| cell.name.as_str()).collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_stretch_shares_space() {
        let layout = GridLayout::arrange([("top", Placement::at(0, 0)), ("bottom", Placement::at(1, 0))])
            .with_row_stretch(BTreeMap::from([(0, 0), (1, 1)]));
        let area = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(100.0, 300.0));
        let rects = layout.cell_rects(area, 0.0);
        assert_eq!(rects[0].height(), 0.0);
        assert_eq!(rects[1].height(), 300.0);

        let even = GridLayout::arrange([("l", Placement::at(0, 0)), ("r", Placement::at(0, 1))]);
        let rects = even.cell_rects(area, 10.0);
        assert_eq!(rects[0].width(), 45.0);
        assert_eq!(rects[1].left(), 55.0);
    }

    #[test]
    fn test_extreme_values_are_clamped() {
        let layout = GridLayout::arrange([
            (
                "far",
                Placement {
                    row_span: u32::MAX,
                    ..Placement::at(u32::MAX, 0)
                },
            ),
            ("next", Placement::default()),
        ]);
        assert_eq!(layout.cell("far").unwrap().row, MAX_GRID_INDEX);
        assert_eq!(layout.rows(), MAX_GRID_INDEX + MAX_GRID_SPAN + 1);

        let area = egui::Rect::from_min_size(egui::pos2(0.0, 0.0), egui::vec2(100.0, 300.0));
        let heavy = GridLayout::arrange([("top", Placement::at(0, 0)), ("bottom", Placement::at(1, 0))])
            .with_row_stretch(BTreeMap::from([(0, u32::MAX), (1, 1)]));
        let rects = heavy.cell_rects(area, 0.0);
        assert_eq!(rects.len(), 2);
        assert!(rects[0].height() > 299.0);
    }
}
