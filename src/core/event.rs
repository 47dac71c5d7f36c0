// Author: Mode Control Entity contributors
// License: MIT

use crate::core::types::{AudioRoute, CallState, DisplayState, ExceptionUi, SystemState};

/// Everything that can change one of the cached inputs the policy layer
/// and the blanking timers read, plus the handful of direct requests a
/// caller can make of the DSM. Each variant carries the wall-clock time in
/// milliseconds it occurred at, so tests can drive the system with a
/// virtual clock instead of sleeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Tick { now_ms: u64 },

    /// A request to change the publicly requested display state.
    DisplayStateRequested { state: DisplayState, now_ms: u64 },

    RendererReply { state: crate::core::types::RendererUiState, now_ms: u64 },
    RendererPeerGone { now_ms: u64 },
    RendererPeerAppeared { now_ms: u64 },

    FbSuspended { now_ms: u64 },
    FbResumed { now_ms: u64 },

    SystemStateChanged { state: SystemState, now_ms: u64 },
    CallStateChanged { state: CallState, now_ms: u64 },
    AlarmActiveChanged { active: bool, now_ms: u64 },
    ChargerChanged { connected: bool, now_ms: u64 },
    AudioRouteChanged { route: AudioRoute, now_ms: u64 },
    ProximityChanged { covered: bool, now_ms: u64 },
    TklockChanged { active: bool, now_ms: u64 },
    ExceptionUiChanged { state: ExceptionUi, now_ms: u64 },
    PackageKitLockChanged { locked: bool, now_ms: u64 },
    ShutdownStarted { now_ms: u64 },
    InitDoneChanged { done: bool, now_ms: u64 },
    DesktopVisible { now_ms: u64 },

    BlankingPauseClientAdded { peer: String, now_ms: u64 },
    BlankingPauseClientRemoved { peer: String, now_ms: u64 },

    CabcModeRequested { mode: String, now_ms: u64 },

    SettingsChanged { now_ms: u64 },
}

impl Event {
    pub fn now_ms(&self) -> u64 {
        match self {
            Event::Tick { now_ms }
            | Event::DisplayStateRequested { now_ms, .. }
            | Event::RendererReply { now_ms, .. }
            | Event::RendererPeerGone { now_ms }
            | Event::RendererPeerAppeared { now_ms }
            | Event::FbSuspended { now_ms }
            | Event::FbResumed { now_ms }
            | Event::SystemStateChanged { now_ms, .. }
            | Event::CallStateChanged { now_ms, .. }
            | Event::AlarmActiveChanged { now_ms, .. }
            | Event::ChargerChanged { now_ms, .. }
            | Event::AudioRouteChanged { now_ms, .. }
            | Event::ProximityChanged { now_ms, .. }
            | Event::TklockChanged { now_ms, .. }
            | Event::ExceptionUiChanged { now_ms, .. }
            | Event::PackageKitLockChanged { now_ms, .. }
            | Event::ShutdownStarted { now_ms }
            | Event::InitDoneChanged { now_ms, .. }
            | Event::DesktopVisible { now_ms }
            | Event::BlankingPauseClientAdded { now_ms, .. }
            | Event::BlankingPauseClientRemoved { now_ms, .. }
            | Event::CabcModeRequested { now_ms, .. }
            | Event::SettingsChanged { now_ms } => *now_ms,
        }
    }
}
