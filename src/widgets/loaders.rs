//! Data loaders shown in the scan setup tab.
//!
//! Each loader handles one data modality. Directory scanning and file decoding
//! belong to the embedding application; a loader here only carries its search
//! roots, file patterns and reader choice, and lets the user pick a file.

use crate::config::{Placement, MAX_GRID_INDEX};
use crate::error::{AppResult, GuiError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Supported loader modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    /// X-ray fluorescence maps
    Xrf,
    /// Ptychographic reconstructions
    #[serde(alias = "ptycho")]
    Ptychography,
}

impl LoaderKind {
    /// Every kind, in panel order.
    pub const ALL: [LoaderKind; 2] = [LoaderKind::Xrf, LoaderKind::Ptychography];

    /// Parse a configuration name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "xrf" => Some(LoaderKind::Xrf),
            "ptychography" | "ptycho" => Some(LoaderKind::Ptychography),
            _ => None,
        }
    }

    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            LoaderKind::Xrf => "xrf",
            LoaderKind::Ptychography => "ptychography",
        }
    }

    /// Heading shown above the loader.
    pub fn label(self) -> &'static str {
        match self {
            LoaderKind::Xrf => "XRF",
            LoaderKind::Ptychography => "Ptychography",
        }
    }

    /// Patterns used when none are configured.
    pub fn default_patterns(self) -> Vec<String> {
        match self {
            LoaderKind::Xrf => vec!["*.dat".to_string(), "*.h5".to_string()],
            LoaderKind::Ptychography => vec!["*.tif".to_string()],
        }
    }

    /// Reader used when none is configured.
    pub fn default_reader(self) -> ReaderKind {
        match self {
            LoaderKind::Xrf => ReaderKind::TextColumns,
            LoaderKind::Ptychography => ReaderKind::Tiff,
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// File readers a loader can hand its selection to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderKind {
    /// Whitespace-separated columns
    TextColumns,
    /// HDF5 container
    Hdf5,
    /// TIFF image stack
    Tiff,
}

fn enabled() -> bool {
    true
}

/// Options of one `loaders.<name>` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoaderOptions {
    /// `false` drops this loader only
    #[serde(default = "enabled")]
    pub enabled: bool,
    /// Single root, searched before `search_paths`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Further roots, searched in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,
    /// Glob patterns matched against file names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_patterns: Vec<String>,
    /// Reader the selection is handed to
    #[serde(default, alias = "loader", skip_serializing_if = "Option::is_none")]
    pub reader: Option<ReaderKind>,
    /// Cell in the loader panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<u32>,
    /// Cell column in the loader panel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Scan numbers offered by the ptychography loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scan_numbers: Vec<String>,
    /// ROI types offered by the ptychography loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roi_types: Vec<String>,
    /// Reconstruction methods offered by the ptychography loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recon_methods: Vec<String>,
    /// Iteration files offered by the ptychography loader
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub iteration_files: Vec<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            search_paths: Vec::new(),
            file_patterns: Vec::new(),
            reader: None,
            row: None,
            column: None,
            scan_numbers: Vec::new(),
            roi_types: Vec::new(),
            recon_methods: Vec::new(),
            iteration_files: Vec::new(),
        }
    }
}

impl LoaderOptions {
    /// Parse one entry; `true`/`false` is shorthand for `{enabled: ...}`.
    pub fn parse(widget: &str, kind: LoaderKind, value: Value) -> AppResult<Self> {
        let option = format!("loaders.{}", kind);
        let value = match value {
            Value::Bool(enabled) => return Ok(Self { enabled, ..Self::default() }),
            Value::Null => return Ok(Self::default()),
            other => other,
        };
        let options: Self = serde_json::from_value(value)
            .map_err(|err| GuiError::config(widget, option.as_str(), err.to_string()))?;

        if kind == LoaderKind::Xrf {
            let ptycho_only = [
                ("scan_numbers", options.scan_numbers.is_empty()),
                ("roi_types", options.roi_types.is_empty()),
                ("recon_methods", options.recon_methods.is_empty()),
                ("iteration_files", options.iteration_files.is_empty()),
            ];
            if let Some((field, _)) = ptycho_only.iter().find(|(_, empty)| !empty) {
                return Err(GuiError::config(
                    widget,
                    format!("{}.{}", option, field),
                    "only valid for the ptychography loader",
                ));
            }
        }
        for (field, index) in [("row", options.row), ("column", options.column)] {
            if index.is_some_and(|index| index > MAX_GRID_INDEX) {
                return Err(GuiError::config(
                    widget,
                    format!("{}.{}", option, field),
                    format!("must be at most {}", MAX_GRID_INDEX),
                ));
            }
        }
        if options.file_patterns.iter().any(|pattern| pattern.trim().is_empty()) {
            return Err(GuiError::config(
                widget,
                format!("{}.file_patterns", option),
                "empty file pattern",
            ));
        }
        Ok(options)
    }
}

/// A loader that will actually be built, with every default applied.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSpec {
    /// Which loader this is
    pub kind: LoaderKind,
    /// Roots in search order
    pub search_paths: Vec<PathBuf>,
    /// Glob patterns matched against file names
    pub file_patterns: Vec<String>,
    /// Reader the selection is handed to
    pub reader: ReaderKind,
    /// Cell in the loader panel, if configured
    pub placement: Option<Placement>,
    /// Ptychography presets
    pub presets: PtychoPresets,
}

/// Preset choices offered by the ptychography loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PtychoPresets {
    /// Scan number choices
    pub scan_numbers: Vec<String>,
    /// ROI type choices
    pub roi_types: Vec<String>,
    /// Reconstruction method choices
    pub recon_methods: Vec<String>,
    /// Iteration file choices
    pub iteration_files: Vec<String>,
}

impl LoaderSpec {
    /// Apply defaults to `options`. `fallback_paths` is used when the loader
    /// declares no roots of its own.
    pub fn from_options(kind: LoaderKind, options: &LoaderOptions, fallback_paths: &[PathBuf]) -> Self {
        let mut search_paths: Vec<PathBuf> = options.path.iter().cloned().collect();
        search_paths.extend(options.search_paths.iter().cloned());
        if search_paths.is_empty() {
            search_paths = fallback_paths.to_vec();
        }
        if search_paths.is_empty() {
            search_paths.push(PathBuf::from("."));
        }
        let file_patterns = if options.file_patterns.is_empty() {
            kind.default_patterns()
        } else {
            options.file_patterns.clone()
        };
        let placement = match (options.row, options.column) {
            (None, None) => None,
            (row, column) => Some(Placement::at(row.unwrap_or(0), column.unwrap_or(0))),
        };
        Self {
            kind,
            search_paths,
            file_patterns,
            reader: options.reader.unwrap_or_else(|| kind.default_reader()),
            placement,
            presets: PtychoPresets {
                scan_numbers: options.scan_numbers.clone(),
                roi_types: options.roi_types.clone(),
                recon_methods: options.recon_methods.clone(),
                iteration_files: options.iteration_files.clone(),
            },
        }
    }

    /// Whether a file name matches one of the patterns.
    ///
    /// Patterns support a single `*` wildcard, which covers every default.
    pub fn matches(&self, file_name: &str) -> bool {
        self.file_patterns.iter().any(|pattern| match pattern.split_once('*') {
            Some((prefix, suffix)) => {
                file_name.len() >= prefix.len() + suffix.len()
                    && file_name.starts_with(prefix)
                    && file_name.ends_with(suffix)
            }
            None => file_name == pattern,
        })
    }
}

/// Interactive state of one loader.
#[derive(Debug)]
pub struct LoaderPanel {
    spec: LoaderSpec,
    folder: String,
    file_name: String,
    scan: usize,
    roi: usize,
    recon: usize,
    selection: Option<PathBuf>,
    error: Option<String>,
}

impl LoaderPanel {
    /// Panel starting in the first search root.
    pub fn new(spec: LoaderSpec) -> Self {
        let folder = spec
            .search_paths
            .first()
            .map(|path| path.display().to_string())
            .unwrap_or_default();
        Self {
            spec,
            folder,
            file_name: String::new(),
            scan: 0,
            roi: 0,
            recon: 0,
            selection: None,
            error: None,
        }
    }

    /// Resolved settings.
    pub fn spec(&self) -> &LoaderSpec {
        &self.spec
    }

    /// Which loader this is.
    pub fn kind(&self) -> LoaderKind {
        self.spec.kind
    }

    /// File chosen with "Load", if any.
    pub fn selection(&self) -> Option<&PathBuf> {
        self.selection.as_ref()
    }

    /// Check the typed file name and record it as the selection.
    pub fn select(&mut self, folder: &str, file_name: &str) -> AppResult<PathBuf> {
        if !self.spec.matches(file_name) {
            return Err(GuiError::Gui(format!(
                "'{}' does not match {}",
                file_name,
                self.spec.file_patterns.join(", ")
            )));
        }
        let path = PathBuf::from(folder).join(file_name);
        self.selection = Some(path.clone());
        Ok(path)
    }

    /// Draw the loader. Returns the new selection when the user loads a file.
    pub fn ui(&mut self, ui: &mut egui::Ui) -> Option<PathBuf> {
        let mut loaded = None;
        ui.group(|ui| {
            ui.strong(self.spec.kind.label());
            ui.horizontal(|ui| {
                ui.label("Folder:");
                let _ = ui.text_edit_singleline(&mut self.folder);
            });
            ui.horizontal(|ui| {
                ui.label("File:");
                let _ = ui.text_edit_singleline(&mut self.file_name);
                if ui.button("Load").clicked() {
                    let folder = self.folder.clone();
                    let file_name = self.file_name.clone();
                    match self.select(&folder, &file_name) {
                        Ok(path) => {
                            tracing::info!(loader = %self.spec.kind, "selected {}", path.display());
                            self.error = None;
                            loaded = Some(path);
                        }
                        Err(err) => self.error = Some(err.to_string()),
                    }
                }
            });
            ui.small(format!("Patterns: {}", self.spec.file_patterns.join(", ")));

            if self.spec.kind == LoaderKind::Ptychography {
                let presets = &self.spec.presets;
                preset_combo(ui, "Scan", "ptycho_scan", &presets.scan_numbers, &mut self.scan);
                preset_combo(ui, "ROI", "ptycho_roi", &presets.roi_types, &mut self.roi);
                preset_combo(ui, "Recon", "ptycho_recon", &presets.recon_methods, &mut self.recon);
            }

            if let Some(err) = &self.error {
                ui.colored_label(egui::Color32::RED, err);
            }
        });
        loaded
    }
}

fn preset_combo(ui: &mut egui::Ui, label: &str, id: &str, choices: &[String], selected: &mut usize) {
    if choices.is_empty() {
        return;
    }
    ui.horizontal(|ui| {
        ui.label(label);
        egui::ComboBox::from_id_salt(id)
            .selected_text(choices.get(*selected).map(String::as_str).unwrap_or(""))
            .show_ui(ui, |ui| {
                for (index, choice) in choices.iter().enumerate() {
                    ui.selectable_value(selected, index, choice);
                }
            });
    });
}
