//! Command-line interface.

use crate::config::default_widget_keys;
use clap::Parser;
use std::path::PathBuf;

/// Beamline control room.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "beamline-gui", version, about = "Beamline control-room widgets")]
pub struct Cli {
    /// Widget keys to show as tabs, in order
    #[arg(value_name = "WIDGET")]
    pub widgets: Vec<String>,

    /// Configuration file (default: ./beamline.yaml, then the user config dir)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Data root for loaders that declare none (repeatable)
    #[arg(long = "data-path", value_name = "PATH")]
    pub data_paths: Vec<PathBuf>,

    /// Log filter, e.g. `debug` or `beamline_gui=trace` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Resolve and build the layout, print it, and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Print the registered widgets and exit
    #[arg(long)]
    pub list_widgets: bool,
}

impl Cli {
    /// Requested widget keys, or the defaults when none were given.
    pub fn requested_widgets(&self) -> Vec<String> {
        if self.widgets.is_empty() {
            default_widget_keys()
        } else {
            self.widgets.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["beamline-gui"]).unwrap();
        assert_eq!(cli.requested_widgets(), vec!["scan_setup", "qserver_monitor"]);
        assert!(cli.config.is_none());
        assert!(!cli.dry_run);
    }

    #[test]
    fn test_widgets_and_repeated_data_paths() {
        let cli = Cli::try_parse_from([
            "beamline-gui",
            "qserver_monitor",
            "scan_setup",
            "--data-path",
            "/data/a",
            "--data-path",
            "/data/b",
            "--config",
            "hutch.yaml",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.requested_widgets(), vec!["qserver_monitor", "scan_setup"]);
        assert_eq!(cli.data_paths, vec![PathBuf::from("/data/a"), PathBuf::from("/data/b")]);
        assert_eq!(cli.config, Some(PathBuf::from("hutch.yaml")));
        assert!(cli.dry_run);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["beamline-gui", "--verbose-queue"]).is_err());
    }
}
