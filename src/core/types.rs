// Author: Mode Control Entity contributors
// License: MIT

//! The display core's data model: the public [`DisplayState`], the
//! DSM's private [`StmState`], and the small enums that feed the
//! policy layer.

use serde::Serialize;

/// The display power state observers see. `PoweringUp`/`PoweringDown` are
/// transitional placeholders published mid-transition; they are never
/// valid as a [`crate::core::event::Event::DisplayStateRequested`] target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayState {
    Undef,
    Off,
    LpmOff,
    LpmOn,
    Dim,
    On,
    PoweringUp,
    PoweringDown,
}

impl DisplayState {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayState::Undef => "undef",
            DisplayState::Off => "off",
            DisplayState::LpmOff => "lpm-off",
            DisplayState::LpmOn => "lpm-on",
            DisplayState::Dim => "dim",
            DisplayState::On => "on",
            DisplayState::PoweringUp => "powering-up",
            DisplayState::PoweringDown => "powering-down",
        }
    }

    /// Collapsed status string used by `get_display_status`: `{off, dim, on}`.
    pub fn status_str(self) -> &'static str {
        match self {
            DisplayState::Off | DisplayState::LpmOff | DisplayState::PoweringDown => "off",
            DisplayState::Dim | DisplayState::LpmOn => "dim",
            DisplayState::On | DisplayState::PoweringUp | DisplayState::Undef => "on",
        }
    }

    /// Whether this state needs the frame buffer powered and some light on
    /// the panel (used to decide LeavePowerOn vs RendererInitStop).
    pub fn needs_power(self) -> bool {
        matches!(self, DisplayState::On | DisplayState::Dim | DisplayState::LpmOn)
    }
}

/// The DSM's internal 18-state machine. Never observed outside `dsm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StmState {
    Unset,
    RendererInitStart,
    RendererWaitStart,
    EnterPowerOn,
    StayPowerOn,
    LeavePowerOn,
    RendererInitStop,
    RendererWaitStop,
    InitSuspend,
    WaitSuspend,
    EnterPowerOff,
    StayPowerOff,
    LeavePowerOff,
    InitResume,
    WaitResume,
    EnterLogicalOff,
    StayLogicalOff,
    LeaveLogicalOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererUiState {
    Unknown,
    Disabled,
    Enabled,
    Error,
}

/// What level of kernel suspend is currently permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuspendPolicy {
    Disabled,
    Enabled,
    EarlyOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InhibitMode {
    Off,
    StayOnWithCharger,
    StayDimWithCharger,
    StayOn,
    StayDim,
}

/// What the policy layer decided is the deepest suspend allowed right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedLevel {
    On,
    Early,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    User,
    ActDead,
    Shutdown,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    None,
    Ringing,
    Active,
}

/// Bitset of transient UI overrides. `CALL` may combine with others; the
/// rest are mutually informative but modeled as independent bits to match
/// the source's bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionUi(u8);

impl ExceptionUi {
    pub const NONE: ExceptionUi = ExceptionUi(0);
    pub const CALL: ExceptionUi = ExceptionUi(1 << 0);
    pub const NOTIFICATION: ExceptionUi = ExceptionUi(1 << 1);
    pub const LINGER: ExceptionUi = ExceptionUi(1 << 2);

    pub fn contains(self, bit: ExceptionUi) -> bool {
        self.0 & bit.0 != 0
    }

    pub fn insert(&mut self, bit: ExceptionUi) {
        self.0 |= bit.0;
    }

    pub fn remove(&mut self, bit: ExceptionUi) {
        self.0 &= !bit.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Any bit set other than `CALL`.
    pub fn has_non_call_bits(self) -> bool {
        self.0 & !Self::CALL.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    Handset,
    Speaker,
    Headset,
    BluetoothA2dp,
}

/// The six independently-armed blanking timers, keyed by logical role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerRole {
    Dim,
    Off,
    LpmOn,
    LpmOff,
    PausePeriod,
    AdaptiveDim,
}

impl TimerRole {
    pub const ALL: [TimerRole; 6] = [
        TimerRole::Dim,
        TimerRole::Off,
        TimerRole::LpmOn,
        TimerRole::LpmOff,
        TimerRole::PausePeriod,
        TimerRole::AdaptiveDim,
    ];
}
