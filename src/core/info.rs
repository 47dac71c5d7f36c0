// Author: Mode Control Entity contributors
// License: MIT

use serde::Serialize;

use crate::core::types::{DisplayState, InhibitMode, SuspendPolicy};

/// Snapshot returned to `mced info` and to the `GetInfo` D-Bus/IPC call.
///
/// - `json` is the stable machine contract (`mced info --json`).
/// - `pretty_text` is the CLI-facing rendering for plain `mced info`.
#[derive(Debug, Clone, Serialize)]
pub struct InfoSnapshot {
    pub json: DisplayInfo,

    #[serde(skip_serializing)]
    pub pretty_text: String,
}

/// The JSON contract for `mced info --json`.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayInfo {
    pub display_state: String,
    pub status: String,
    pub brightness: u8,
    pub cabc_mode: String,
    pub inhibit_mode: InhibitMode,
    pub suspend_policy: SuspendPolicy,
    pub blanking_paused: bool,
    pub blanking_pause_clients: usize,
    pub low_power_mode_enabled: bool,
    pub charger_connected: bool,
}

impl InfoSnapshot {
    pub fn new(json: DisplayInfo, pretty_text: impl Into<String>) -> Self {
        Self {
            json,
            pretty_text: pretty_text.into(),
        }
    }

    pub fn render(state: DisplayState, info: &DisplayInfo) -> String {
        format!(
            "display: {}\nbrightness: {}\ncabc: {}\ninhibit: {:?}\nblanking paused: {} ({} client(s))",
            state.as_str(),
            info.brightness,
            info.cabc_mode,
            info.inhibit_mode,
            info.blanking_paused,
            info.blanking_pause_clients,
        )
    }
}
