// Author: Mode Control Entity contributors
// License: MIT

//! BlankingTimers: arms/disarms the six display timers from
//! `(display_state, call, alarm, charger, audio_route, proximity,
//! tklock, inhibit_mode, blanking_paused)`.

use std::collections::HashMap;

use crate::core::config::Settings;
use crate::core::types::{AudioRoute, CallState, DisplayState, ExceptionUi, InhibitMode, TimerRole};

/// The inputs `rethink_timers` compares against its cached-previous copy
/// to decide whether anything actually changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlankingInputs {
    pub display_state: DisplayState,
    pub call_state: CallState,
    pub alarm_active: bool,
    pub charger_connected: bool,
    pub audio_route: AudioRoute,
    pub proximity_covered: bool,
    pub tklock_active: bool,
    pub inhibit_mode: InhibitMode,
    pub exception_ui: ExceptionUi,
}

pub struct BlankingTimers {
    /// Deadline (ms, virtual clock) each armed role fires at.
    armed: HashMap<TimerRole, u64>,
    cached_inputs: Option<BlankingInputs>,
    pause_clients: Vec<String>,
    adaptive_index: u32,
    adaptive_window_until: Option<u64>,
}

impl BlankingTimers {
    pub fn new() -> Self {
        Self {
            armed: HashMap::new(),
            cached_inputs: None,
            pause_clients: Vec::new(),
            adaptive_index: 0,
            adaptive_window_until: None,
        }
    }

    pub fn is_armed(&self, role: TimerRole) -> bool {
        self.armed.contains_key(&role)
    }

    pub fn deadline(&self, role: TimerRole) -> Option<u64> {
        self.armed.get(&role).copied()
    }

    pub fn blanking_paused(&self) -> bool {
        self.is_armed(TimerRole::PausePeriod)
    }

    pub fn pause_client_count(&self) -> usize {
        self.pause_clients.len()
    }

    /// Roles whose deadline has passed; removes them (one-shot).
    pub fn poll_expired(&mut self, now_ms: u64) -> Vec<TimerRole> {
        let fired: Vec<TimerRole> = self
            .armed
            .iter()
            .filter(|(_, &deadline)| deadline <= now_ms)
            .map(|(&role, _)| role)
            .collect();
        for role in &fired {
            self.armed.remove(role);
        }
        fired
    }

    fn arm(&mut self, role: TimerRole, now_ms: u64, timeout_secs_or_ms: u64, is_ms: bool) {
        let timeout_ms = if is_ms { timeout_secs_or_ms } else { timeout_secs_or_ms * 1000 };
        self.armed.insert(role, now_ms + timeout_ms);
    }

    fn cancel(&mut self, role: TimerRole) {
        self.armed.remove(&role);
    }

    /// First index whose stored timeout is >= `dim_timeout`, clamped to the
    /// last index if none qualifies. The source's own helper has a
    /// transcription typo in its comparison; this implements the documented
    /// intent rather than the typo.
    pub fn find_dim_timeout_index(possible: &[u64], dim_timeout: u64) -> usize {
        possible
            .iter()
            .position(|&v| v >= dim_timeout)
            .unwrap_or_else(|| possible.len().saturating_sub(1))
    }

    /// Call when the display state transitions away from `Dim` back to
    /// `On`: advances the adaptive index if the threshold window is still
    /// open, otherwise resets it.
    pub fn on_left_dim_to_on(&mut self, now_ms: u64) {
        match self.adaptive_window_until {
            Some(deadline) if now_ms <= deadline => self.adaptive_index += 1,
            _ => self.adaptive_index = 0,
        }
    }

    /// Call when the display state enters `Off` or `LpmOff`: the adaptive
    /// window is torn down entirely.
    pub fn on_enter_off_or_lpmoff(&mut self) {
        self.adaptive_window_until = None;
        self.adaptive_index = 0;
    }

    fn dim_timeout_secs(&mut self, settings: &Settings, now_ms: u64) -> u64 {
        if !settings.adaptive_dimming_enabled {
            return settings.disp_dim_timeout;
        }

        match self.adaptive_window_until {
            Some(deadline) if now_ms <= deadline => {}
            _ => {
                self.adaptive_window_until = Some(now_ms + settings.adaptive_dimming_threshold_ms);
                self.adaptive_index = 0;
            }
        }

        let base = Self::find_dim_timeout_index(&settings.possible_dim_timeouts, settings.disp_dim_timeout);
        let idx = (base + self.adaptive_index as usize).min(settings.possible_dim_timeouts.len() - 1);
        settings.possible_dim_timeouts[idx]
    }

    /// Reject unless `display_state == On && !tklock`; bounded to
    /// `BLANKING_PAUSE_MAX_MONITORED` concurrent peers.
    pub fn add_pause_client(
        &mut self,
        peer: &str,
        display_state: DisplayState,
        tklock_active: bool,
        now_ms: u64,
        blank_prevent_timeout_secs: u64,
    ) -> Result<(), &'static str> {
        if display_state != DisplayState::On || tklock_active {
            return Err("display not on or tklock active");
        }
        if self.pause_clients.iter().any(|p| p == peer) {
            return Ok(());
        }
        if self.pause_clients.len() >= crate::core::config::BLANKING_PAUSE_MAX_MONITORED {
            return Err("too many blanking-pause clients");
        }

        self.pause_clients.push(peer.to_string());
        self.arm(TimerRole::PausePeriod, now_ms, blank_prevent_timeout_secs, false);
        Ok(())
    }

    pub fn remove_pause_client(&mut self, peer: &str) {
        self.pause_clients.retain(|p| p != peer);
        if self.pause_clients.is_empty() {
            self.cancel(TimerRole::PausePeriod);
        }
    }

    /// Recompute the active timer set. Does nothing unless `inputs` differs
    /// from the cached-previous copy or `force` is set. Unconditionally
    /// cancels Dim/Off/LpmOn/LpmOff first, then re-arms per
    /// `inputs.display_state`. `settings.never_blank` suppresses the Dim
    /// and Off arming that the On/Dim states would otherwise schedule,
    /// disabling the automatic On -> Dim -> Off progression entirely.
    pub fn rethink_timers(&mut self, inputs: BlankingInputs, settings: &Settings, now_ms: u64, force: bool) {
        if !force && self.cached_inputs == Some(inputs) {
            return;
        }
        self.cached_inputs = Some(inputs);

        self.cancel(TimerRole::Dim);
        self.cancel(TimerRole::Off);
        self.cancel(TimerRole::LpmOn);
        self.cancel(TimerRole::LpmOff);

        match inputs.display_state {
            DisplayState::Off => {}

            DisplayState::LpmOff => {
                self.arm(TimerRole::Off, now_ms, settings.disp_lpm_off_timeout, false);
            }

            DisplayState::LpmOn => {
                self.arm(
                    TimerRole::LpmOff,
                    now_ms,
                    crate::core::config::DEFAULT_LPM_PROXIMITY_BLANK_TIMEOUT_SECS,
                    false,
                );
            }

            DisplayState::Dim if settings.never_blank => {}

            DisplayState::Dim => {
                let stay_dim = inputs.inhibit_mode == InhibitMode::StayDim
                    || (inputs.inhibit_mode == InhibitMode::StayDimWithCharger && inputs.charger_connected);
                if !stay_dim {
                    self.arm(TimerRole::Off, now_ms, settings.disp_blank_timeout, false);
                }
            }

            DisplayState::On if settings.never_blank => {}

            DisplayState::On => {
                if inputs.exception_ui.has_non_call_bits() {
                    // Host UI owns blanking while a notification/linger
                    // exception is showing.
                } else if inputs.exception_ui.contains(ExceptionUi::CALL) {
                    let handset_and_covered =
                        inputs.audio_route == AudioRoute::Handset && inputs.proximity_covered;
                    if inputs.call_state == CallState::Ringing || handset_and_covered {
                        // no timer
                    } else {
                        let secs = self.dim_timeout_secs(settings, now_ms);
                        self.arm(TimerRole::Dim, now_ms, secs, false);
                    }
                } else {
                    let stay_on = inputs.inhibit_mode == InhibitMode::StayOn
                        || (inputs.inhibit_mode == InhibitMode::StayOnWithCharger && inputs.charger_connected);
                    if stay_on {
                        // no timer
                    } else if inputs.tklock_active {
                        self.arm(TimerRole::Off, now_ms, settings.disp_blank_timeout, false);
                    } else if self.blanking_paused() {
                        // no timer while paused
                    } else {
                        let secs = self.dim_timeout_secs(settings, now_ms);
                        self.arm(TimerRole::Dim, now_ms, secs, false);
                    }
                }
            }

            DisplayState::PoweringUp | DisplayState::PoweringDown | DisplayState::Undef => {}
        }
    }
}

impl Default for BlankingTimers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_inputs() -> BlankingInputs {
        BlankingInputs {
            display_state: DisplayState::On,
            call_state: CallState::None,
            alarm_active: false,
            charger_connected: false,
            audio_route: AudioRoute::Speaker,
            proximity_covered: false,
            tklock_active: false,
            inhibit_mode: InhibitMode::Off,
            exception_ui: ExceptionUi::NONE,
        }
    }

    #[test]
    fn on_state_arms_dim_timer() {
        let mut t = BlankingTimers::new();
        let settings = Settings::default();
        t.rethink_timers(base_inputs(), &settings, 0, false);
        assert!(t.is_armed(TimerRole::Dim));
        assert!(!t.is_armed(TimerRole::Off));
    }

    #[test]
    fn unchanged_inputs_do_not_rearm() {
        let mut t = BlankingTimers::new();
        let settings = Settings::default();
        t.rethink_timers(base_inputs(), &settings, 0, false);
        let deadline = t.deadline(TimerRole::Dim);
        t.rethink_timers(base_inputs(), &settings, 500, false);
        assert_eq!(t.deadline(TimerRole::Dim), deadline);
    }

    #[test]
    fn tklock_skips_dim_straight_to_off() {
        let mut t = BlankingTimers::new();
        let settings = Settings::default();
        let mut inputs = base_inputs();
        inputs.tklock_active = true;
        t.rethink_timers(inputs, &settings, 0, false);
        assert!(!t.is_armed(TimerRole::Dim));
        assert!(t.is_armed(TimerRole::Off));
    }

    #[test]
    fn ringing_call_suppresses_all_timers() {
        let mut t = BlankingTimers::new();
        let settings = Settings::default();
        let mut inputs = base_inputs();
        inputs.exception_ui.insert(ExceptionUi::CALL);
        inputs.call_state = CallState::Ringing;
        t.rethink_timers(inputs, &settings, 0, false);
        assert!(!t.is_armed(TimerRole::Dim));
        assert!(!t.is_armed(TimerRole::Off));
    }

    #[test]
    fn adaptive_dimming_monotonically_increases_within_window() {
        let mut t = BlankingTimers::new();
        let mut settings = Settings::default();
        settings.possible_dim_timeouts = vec![1, 5, 10, 15, 20];
        settings.disp_dim_timeout = 5;
        settings.adaptive_dimming_threshold_ms = 5_000;

        t.rethink_timers(base_inputs(), &settings, 0, false);
        assert_eq!(t.deadline(TimerRole::Dim), Some(5_000));

        t.on_left_dim_to_on(5_000);
        t.rethink_timers(base_inputs(), &settings, 5_000, true);
        assert_eq!(t.deadline(TimerRole::Dim), Some(5_000 + 10_000));

        t.on_left_dim_to_on(15_000);
        t.rethink_timers(base_inputs(), &settings, 15_000, true);
        assert_eq!(t.deadline(TimerRole::Dim), Some(15_000 + 15_000));
    }

    #[test]
    fn pause_client_bounded_to_five() {
        let mut t = BlankingTimers::new();
        for i in 0..5 {
            assert!(t
                .add_pause_client(&format!("peer.{i}"), DisplayState::On, false, 0, 60)
                .is_ok());
        }
        assert!(t.add_pause_client("peer.6", DisplayState::On, false, 0, 60).is_err());
    }

    #[test]
    fn pause_rejected_when_not_on_or_tklocked() {
        let mut t = BlankingTimers::new();
        assert!(t.add_pause_client("peer.0", DisplayState::Dim, false, 0, 60).is_err());
        assert!(t.add_pause_client("peer.0", DisplayState::On, true, 0, 60).is_err());
    }

    #[test]
    fn last_pause_client_leaving_disarms_pause_period() {
        let mut t = BlankingTimers::new();
        t.add_pause_client("peer.0", DisplayState::On, false, 0, 60).unwrap();
        assert!(t.is_armed(TimerRole::PausePeriod));
        t.remove_pause_client("peer.0");
        assert!(!t.is_armed(TimerRole::PausePeriod));
    }

    #[test]
    fn never_blank_suppresses_dim_and_off_arming_from_on() {
        let mut t = BlankingTimers::new();
        let mut settings = Settings::default();
        settings.never_blank = true;
        t.rethink_timers(base_inputs(), &settings, 0, false);
        assert!(!t.is_armed(TimerRole::Dim));
        assert!(!t.is_armed(TimerRole::Off));
    }

    #[test]
    fn never_blank_suppresses_off_arming_from_dim() {
        let mut t = BlankingTimers::new();
        let mut settings = Settings::default();
        settings.never_blank = true;
        let mut inputs = base_inputs();
        inputs.display_state = DisplayState::Dim;
        t.rethink_timers(inputs, &settings, 0, false);
        assert!(!t.is_armed(TimerRole::Off));
    }
}
