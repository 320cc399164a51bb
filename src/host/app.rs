//! Native window for an assembled control room.

use super::{Assembly, Tab};
use crate::config::LayoutMode;
use crate::status::StatusBus;
use egui_dock::{DockArea, DockState, Style, TabViewer};

/// eframe application showing every assembled tab.
pub struct ControlRoomApp {
    assembly: Assembly,
    dock_state: DockState<usize>,
    status_bus: StatusBus,
}

impl ControlRoomApp {
    /// App over `assembly`; the status bar follows `status_bus`.
    pub fn new(assembly: Assembly, status_bus: StatusBus) -> Self {
        let dock_state = DockState::new((0..assembly.tabs.len()).collect());
        Self {
            assembly,
            dock_state,
            status_bus,
        }
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| match self.status_bus.latest() {
            Some(message) => {
                ui.colored_label(message.color(), &message.text);
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(message.timestamp.format("%H:%M:%S").to_string());
                });
            }
            None => {
                ui.label(&self.assembly.idle_message);
            }
        });
    }
}

struct ControlRoomTabs<'a> {
    tabs: &'a mut [Tab],
}

fn tab_contents(ui: &mut egui::Ui, tab: &mut Tab) {
    if !tab.description.is_empty() {
        ui.weak(&tab.description);
        ui.separator();
    }
    tab.widget.ui(ui);
}

impl<'a> TabViewer for ControlRoomTabs<'a> {
    type Tab = usize;

    fn title(&mut self, tab: &mut Self::Tab) -> egui::WidgetText {
        self.tabs
            .get(*tab)
            .map_or_else(String::new, |tab| tab.title.clone())
            .into()
    }

    fn id(&mut self, tab: &mut Self::Tab) -> egui::Id {
        egui::Id::new(("control_room_tab", *tab))
    }

    fn ui(&mut self, ui: &mut egui::Ui, tab: &mut Self::Tab) {
        if let Some(tab) = self.tabs.get_mut(*tab) {
            tab_contents(ui, tab);
        }
    }

    fn closeable(&mut self, _tab: &mut Self::Tab) -> bool {
        false
    }
}

impl eframe::App for ControlRoomApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.assembly.mode {
            LayoutMode::Tabs => {
                let mut viewer = ControlRoomTabs {
                    tabs: &mut self.assembly.tabs,
                };
                DockArea::new(&mut self.dock_state)
                    .style(Style::from_egui(ctx.style().as_ref()))
                    .show_inside(ui, &mut viewer);
            }
            LayoutMode::Grid => {
                let grid = self.assembly.grid();
                let tabs = &mut self.assembly.tabs;
                grid.show(ui, |ui, cell| {
                    if let Some(tab) = tabs.get_mut(cell.index) {
                        ui.heading(&tab.title);
                        tab_contents(ui, tab);
                    }
                });
            }
        });

        // queue widgets pick up new snapshots on the next frame
        ctx.request_repaint_after(self.assembly.poll_interval);
    }
}
