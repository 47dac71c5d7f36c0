// Author: Mode Control Entity contributors
// License: MIT

//! Pure predicate layer. Neither function touches
//! I/O or mutable state; both take a snapshot of cached inputs and return
//! an answer, so they are exhaustively unit-testable.

use crate::core::types::{
    AllowedLevel, CallState, DisplayState, ExceptionUi, RendererUiState, SuspendPolicy, SystemState,
};

/// The cached inputs both policy functions read. Built fresh from
/// `DisplayCore` on every DSM rethink; cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct PolicyInputs {
    pub renderer_ui_state: RendererUiState,
    pub unloading_module: bool,
    pub suspend_policy: SuspendPolicy,
    pub call_state: CallState,
    pub alarm_active: bool,
    pub exception_ui: ExceptionUi,
    pub system_state: SystemState,
    pub init_done: bool,
    pub shutdown_started: bool,
    pub packagekit_locked: bool,
    pub proximity_covered: bool,
}

/// The maximum suspend level currently permitted.
///
/// Returns [`AllowedLevel::On`] (no suspend at all) if the renderer has not
/// confirmed it is disabled, the module is unloading, or suspend is
/// disabled outright. Downgrades to [`AllowedLevel::Early`] (fb power-off
/// only) for any of: an incoming ring or active alarm, a Notification or
/// Linger exception UI, a system state other than `User`, bootup not
/// complete, shutdown in progress, PackageKit holding a lock, or a suspend
/// policy of `EarlyOnly`. Otherwise [`AllowedLevel::Late`] (kernel
/// autosuspend permitted).
pub fn allowed_level(inputs: &PolicyInputs) -> AllowedLevel {
    if inputs.renderer_ui_state != RendererUiState::Disabled
        || inputs.unloading_module
        || inputs.suspend_policy == SuspendPolicy::Disabled
    {
        return AllowedLevel::On;
    }

    let ringing_or_alarm = inputs.call_state == CallState::Ringing || inputs.alarm_active;
    let exception_blocks = inputs.exception_ui.contains(ExceptionUi::NOTIFICATION)
        || inputs.exception_ui.contains(ExceptionUi::LINGER);

    if ringing_or_alarm
        || exception_blocks
        || inputs.system_state != SystemState::User
        || !inputs.init_done
        || inputs.shutdown_started
        || inputs.packagekit_locked
        || inputs.suspend_policy == SuspendPolicy::EarlyOnly
    {
        return AllowedLevel::Early;
    }

    AllowedLevel::Late
}

/// Human-readable reason an external display-on/dim request must be
/// denied, or `"allowed"` if it would succeed. Request-target aware only
/// in that callers are expected to call this before honoring an on/dim
/// request; the function itself does not look at the requested state.
pub fn reason_to_block_display_on(inputs: &PolicyInputs) -> &'static str {
    if inputs.system_state != SystemState::User && inputs.system_state != SystemState::ActDead {
        return "system state does not allow display on";
    }
    if inputs.call_state == CallState::Ringing || inputs.call_state == CallState::Active {
        return "call in progress";
    }
    if inputs.alarm_active {
        return "alarm active";
    }
    if inputs.proximity_covered {
        return "proximity covered";
    }
    "allowed"
}

/// `true` iff early suspend is allowed by the renderer precondition alone;
/// used by the DSM's `InitSuspend` step ahead of consulting [`allowed_level`].
pub fn early_suspend_allowed(renderer_ui_state: RendererUiState) -> bool {
    renderer_ui_state == RendererUiState::Disabled
}

/// Placeholder emitted while a transition is in flight, chosen by whether
/// we are leaving or entering `Off`.
pub fn placeholder_for_transition(leaving_off: bool) -> DisplayState {
    if leaving_off {
        DisplayState::PoweringUp
    } else {
        DisplayState::PoweringDown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> PolicyInputs {
        PolicyInputs {
            renderer_ui_state: RendererUiState::Disabled,
            unloading_module: false,
            suspend_policy: SuspendPolicy::Enabled,
            call_state: CallState::None,
            alarm_active: false,
            exception_ui: ExceptionUi::NONE,
            system_state: SystemState::User,
            init_done: true,
            shutdown_started: false,
            packagekit_locked: false,
            proximity_covered: false,
        }
    }

    #[test]
    fn renderer_not_disabled_forces_on() {
        let mut inputs = base_inputs();
        inputs.renderer_ui_state = RendererUiState::Unknown;
        assert_eq!(allowed_level(&inputs), AllowedLevel::On);
    }

    #[test]
    fn disabled_suspend_policy_forces_on() {
        let mut inputs = base_inputs();
        inputs.suspend_policy = SuspendPolicy::Disabled;
        assert_eq!(allowed_level(&inputs), AllowedLevel::On);
    }

    #[test]
    fn ringing_downgrades_to_early() {
        let mut inputs = base_inputs();
        inputs.call_state = CallState::Ringing;
        assert_eq!(allowed_level(&inputs), AllowedLevel::Early);
    }

    #[test]
    fn early_only_policy_downgrades_to_early() {
        let mut inputs = base_inputs();
        inputs.suspend_policy = SuspendPolicy::EarlyOnly;
        assert_eq!(allowed_level(&inputs), AllowedLevel::Early);
    }

    #[test]
    fn clean_inputs_allow_late_suspend() {
        assert_eq!(allowed_level(&base_inputs()), AllowedLevel::Late);
    }

    #[test]
    fn reason_reports_call_before_alarm() {
        let mut inputs = base_inputs();
        inputs.call_state = CallState::Active;
        inputs.alarm_active = true;
        assert_eq!(reason_to_block_display_on(&inputs), "call in progress");
    }

    #[test]
    fn reason_allowed_when_clean() {
        assert_eq!(reason_to_block_display_on(&base_inputs()), "allowed");
    }
}
