// Author: Mode Control Entity contributors
// License: MIT

mod run;

use std::path::PathBuf;

use crate::core::config::Settings;
use crate::core::context::DisplayCore;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

/// Owns the settings a reload can replace and the `DisplayCore` built from
/// them. `core` is `None` until `run` has connected to the system bus and
/// constructed it, so the daemon has exactly one `DisplayCore` for its
/// whole lifetime rather than one per reload.
pub struct Daemon {
    settings: Settings,
    config_path: PathBuf,
    core: Option<DisplayCore>,
}

impl Daemon {
    pub fn new(settings: Settings, config_path: PathBuf) -> Self {
        Self { settings, config_path, core: None }
    }
}
