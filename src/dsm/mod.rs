// Author: Mode Control Entity contributors
// License: MIT

//! The display state machine: the arbiter that serializes display-state
//! changes and drives renderer IPC, frame-buffer suspend/resume, and
//! wakelock ownership around them.
//!
//! `Dsm` is an explicit tagged state machine, not coroutine code, because
//! it must be polled from many independent callers (policy changes,
//! D-Bus replies, fb events) and several of its states are legitimately
//! "waiting" states observable from outside. All I/O this machine needs
//! to perform goes through [`DsmIo`] so the transition table itself stays
//! a pure function of `(state, inputs) -> state` and can be driven from
//! unit tests with a fake.

pub mod fb_waiter;
pub mod renderer_ipc;

use crate::core::config::LED_DELAY_FB_SUSPEND_RESUME_MS;
use crate::core::policy::{self, PolicyInputs};
use crate::core::types::{DisplayState, RendererUiState, StmState};
use crate::mwarn;

/// Side effects the DSM needs performed on its behalf. Implemented for
/// real I/O by `crate::daemon`'s wiring, and by an in-memory recorder in
/// tests.
pub trait DsmIo {
    fn request_renderer(&mut self, enabled: bool, now_ms: u64);
    fn start_fb_suspend(&mut self, now_ms: u64);
    fn start_fb_resume(&mut self, now_ms: u64);
    fn acquire_wakelock(&mut self);
    /// Downgrade the display-on wakelock to a short timed lock rather than
    /// releasing it outright, so a transition mid-flight can't let the
    /// system suspend before the new state settles.
    fn release_wakelock_timed(&mut self, timeout_ms: u64);
    fn commit_display_state(&mut self, state: DisplayState, now_ms: u64);
    fn suspend_sensors(&mut self);
    fn resume_sensors(&mut self);
}

/// Safety cap on `step()` calls inside a single `exec()`; the table has no
/// terminal state, but any real input sequence settles in far fewer than
/// this many hops. Guards against an unintentional infinite loop in a
/// step-table bug degrading to a hung daemon.
const MAX_STEPS_PER_EXEC: u32 = 64;

pub struct Dsm {
    curr: StmState,
    next: StmState,
    want: DisplayState,
    /// The state `Stay*` last settled into; what `display_state()` reports
    /// outside of a transition.
    committed: DisplayState,
    renderer_ui_state: RendererUiState,
    fb_suspended: bool,
    acquire_wakelock: bool,
    /// Set when the UI peer just (re)appeared; forces a redundant
    /// `Enabled` call at the next `StayPowerOn` so a restarted renderer
    /// picks up the state it missed while it was gone.
    renderer_resync_pending: bool,
    /// Wall-clock of entering `WaitSuspend`/`WaitResume`, used to raise
    /// the stuck-fb-transition alert after `LED_DELAY_FB_SUSPEND_RESUME_MS`.
    fb_wait_started_ms: Option<u64>,
    fb_wait_alert_fired: bool,
}

impl Dsm {
    pub fn new() -> Self {
        Self {
            curr: StmState::Unset,
            next: StmState::Unset,
            want: DisplayState::Off,
            committed: DisplayState::Off,
            renderer_ui_state: RendererUiState::Unknown,
            fb_suspended: false,
            acquire_wakelock: false,
            renderer_resync_pending: false,
            fb_wait_started_ms: None,
            fb_wait_alert_fired: false,
        }
    }

    /// The state observers see: the committed `Stay*` state, or a
    /// transitional placeholder while a multi-step change is in flight.
    pub fn display_state(&self) -> DisplayState {
        if self.is_settled() {
            self.committed
        } else {
            policy::placeholder_for_transition(self.leaving_off())
        }
    }

    pub fn is_settled(&self) -> bool {
        self.curr == self.next
            && matches!(
                self.curr,
                StmState::StayPowerOn | StmState::StayPowerOff | StmState::StayLogicalOff
            )
    }

    fn leaving_off(&self) -> bool {
        matches!(
            self.curr,
            StmState::LeavePowerOff | StmState::InitResume | StmState::WaitResume
        )
    }

    /// `true` iff the `"mce_display_on"` wakelock must be held right now:
    /// everywhere except `StayPowerOff` with late suspend allowed, or the
    /// initial `Unset` state (P3).
    pub fn wakelock_required(&self, allowed: crate::core::types::AllowedLevel) -> bool {
        if self.curr == StmState::Unset {
            return false;
        }
        !(self.curr == StmState::StayPowerOff && allowed == crate::core::types::AllowedLevel::Late)
    }

    pub fn request(&mut self, next: DisplayState) {
        self.want = next;
    }

    pub fn renderer_ui_state(&self) -> RendererUiState {
        self.renderer_ui_state
    }

    pub fn curr_state(&self) -> StmState {
        self.curr
    }

    pub fn on_renderer_reply(&mut self, state: RendererUiState) {
        self.renderer_ui_state = state;
    }

    pub fn on_renderer_peer_gone(&mut self) {
        // Treated as success per IpcPeerGone semantics: proceed without UI
        // cooperation rather than waiting forever.
        if matches!(self.curr, StmState::RendererWaitStart) {
            self.renderer_ui_state = RendererUiState::Enabled;
        } else if matches!(self.curr, StmState::RendererWaitStop) {
            self.renderer_ui_state = RendererUiState::Disabled;
        }
    }

    pub fn on_renderer_peer_appeared(&mut self) {
        self.renderer_resync_pending = true;
    }

    pub fn on_fb_state_change(&mut self, suspended: bool) {
        self.fb_suspended = suspended;
    }

    /// Run `step()` until it stops making progress.
    pub fn exec(&mut self, io: &mut dyn DsmIo, inputs: &PolicyInputs, now_ms: u64) {
        for _ in 0..MAX_STEPS_PER_EXEC {
            if !self.step(io, inputs, now_ms) {
                break;
            }
        }

        let allowed = policy::allowed_level(inputs);
        let required = self.wakelock_required(allowed);
        if required && !self.acquire_wakelock {
            io.acquire_wakelock();
            self.acquire_wakelock = true;
        } else if !required && self.acquire_wakelock {
            io.release_wakelock_timed(1000);
            self.acquire_wakelock = false;
        }
    }

    fn target_needs_power(&self) -> bool {
        self.want.needs_power()
    }

    /// One row of the transition table. Returns whether a transition
    /// occurred (caller should call again until `false`).
    fn step(&mut self, io: &mut dyn DsmIo, inputs: &PolicyInputs, now_ms: u64) -> bool {
        let before = self.curr;

        match self.curr {
            StmState::Unset => {
                self.curr = StmState::RendererInitStart;
            }

            StmState::RendererInitStart => {
                if self.no_renderer_present() {
                    self.curr = StmState::EnterPowerOn;
                } else {
                    self.renderer_ui_state = RendererUiState::Unknown;
                    io.request_renderer(true, now_ms);
                    self.curr = StmState::RendererWaitStart;
                }
            }

            StmState::RendererWaitStart => match self.renderer_ui_state {
                RendererUiState::Enabled => self.curr = StmState::EnterPowerOn,
                RendererUiState::Unknown => {}
                RendererUiState::Disabled | RendererUiState::Error => {
                    self.curr = StmState::RendererInitStart;
                }
            },

            StmState::EnterPowerOn => {
                self.committed = self.want;
                io.commit_display_state(self.committed, now_ms);
                self.curr = StmState::StayPowerOn;
                self.next = self.curr;
            }

            StmState::StayPowerOn => {
                if self.want != self.committed || self.renderer_resync_pending {
                    if self.renderer_resync_pending {
                        io.request_renderer(true, now_ms);
                        self.renderer_resync_pending = false;
                    }
                    if self.want != self.committed {
                        self.curr = StmState::LeavePowerOn;
                        self.next = self.curr;
                    }
                }
            }

            StmState::LeavePowerOn => {
                self.curr = if self.target_needs_power() {
                    StmState::RendererInitStart
                } else {
                    StmState::RendererInitStop
                };
            }

            StmState::RendererInitStop => {
                if self.no_renderer_present() {
                    self.curr = StmState::EnterLogicalOff;
                } else {
                    io.request_renderer(false, now_ms);
                    self.curr = StmState::RendererWaitStop;
                }
            }

            StmState::RendererWaitStop => match self.renderer_ui_state {
                RendererUiState::Disabled => self.curr = StmState::InitSuspend,
                RendererUiState::Unknown => {}
                RendererUiState::Enabled | RendererUiState::Error => {
                    self.curr = StmState::RendererInitStop;
                }
            },

            StmState::InitSuspend => {
                if policy::early_suspend_allowed(self.renderer_ui_state)
                    && inputs_allow_early(inputs)
                {
                    io.start_fb_suspend(now_ms);
                    self.fb_wait_started_ms = Some(now_ms);
                    self.fb_wait_alert_fired = false;
                    self.curr = StmState::WaitSuspend;
                } else {
                    self.curr = StmState::EnterLogicalOff;
                }
            }

            StmState::WaitSuspend => {
                self.check_fb_wait_alert(now_ms, "suspend");
                if self.fb_suspended {
                    self.fb_wait_started_ms = None;
                    self.curr = StmState::EnterPowerOff;
                }
            }

            StmState::EnterPowerOff => {
                self.committed = DisplayState::Off;
                io.commit_display_state(self.committed, now_ms);
                self.curr = StmState::StayPowerOff;
                self.next = self.curr;
            }

            StmState::StayPowerOff => {
                let allowed = crate::core::policy::allowed_level(inputs);
                if self.want != self.committed
                    || allowed != crate::core::types::AllowedLevel::Late
                {
                    self.curr = StmState::LeavePowerOff;
                    self.next = self.curr;
                } else {
                    io.resume_sensors();
                }
            }

            StmState::LeavePowerOff => {
                self.curr = if self.target_needs_power() {
                    StmState::InitResume
                } else {
                    StmState::EnterPowerOff
                };
            }

            StmState::InitResume => {
                io.start_fb_resume(now_ms);
                self.fb_wait_started_ms = Some(now_ms);
                self.fb_wait_alert_fired = false;
                self.curr = StmState::WaitResume;
            }

            StmState::WaitResume => {
                self.check_fb_wait_alert(now_ms, "resume");
                if !self.fb_suspended {
                    self.fb_wait_started_ms = None;
                    self.curr = if self.target_needs_power() {
                        StmState::RendererInitStart
                    } else {
                        StmState::EnterLogicalOff
                    };
                }
            }

            StmState::EnterLogicalOff => {
                self.committed = DisplayState::LpmOff;
                io.commit_display_state(self.committed, now_ms);
                io.suspend_sensors();
                self.curr = StmState::StayLogicalOff;
                self.next = self.curr;
            }

            StmState::StayLogicalOff => {
                if self.want != self.committed {
                    self.curr = StmState::LeaveLogicalOff;
                    self.next = self.curr;
                } else if self.renderer_resync_pending {
                    self.curr = StmState::RendererInitStop;
                    self.next = self.curr;
                }
            }

            StmState::LeaveLogicalOff => {
                self.curr = if self.target_needs_power() {
                    StmState::RendererInitStart
                } else {
                    StmState::InitSuspend
                };
            }
        }

        if self.curr != before {
            if !matches!(
                self.curr,
                StmState::StayPowerOn | StmState::StayPowerOff | StmState::StayLogicalOff
            ) {
                self.next = self.curr;
            }
            true
        } else {
            false
        }
    }

    fn no_renderer_present(&self) -> bool {
        false
    }

    /// Warn once per suspend/resume wait if the frame buffer hasn't
    /// settled within `LED_DELAY_FB_SUSPEND_RESUME_MS`; the real device
    /// flashes an alert LED pattern here, we log it instead since this
    /// crate owns no LED abstraction of its own.
    fn check_fb_wait_alert(&mut self, now_ms: u64, which: &str) {
        if self.fb_wait_alert_fired {
            return;
        }
        let Some(started) = self.fb_wait_started_ms else { return };
        if now_ms.saturating_sub(started) >= LED_DELAY_FB_SUSPEND_RESUME_MS {
            mwarn!(
                "dsm",
                "fb {which} has been pending for {}ms, raising alert LED pattern",
                now_ms.saturating_sub(started)
            );
            self.fb_wait_alert_fired = true;
        }
    }
}

impl Default for Dsm {
    fn default() -> Self {
        Self::new()
    }
}

fn inputs_allow_early(inputs: &PolicyInputs) -> bool {
    !matches!(
        crate::core::policy::allowed_level(inputs),
        crate::core::types::AllowedLevel::On
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CallState, ExceptionUi, SuspendPolicy, SystemState};

    #[derive(Default)]
    struct FakeIo {
        renderer_calls: Vec<bool>,
        fb_suspends: u32,
        fb_resumes: u32,
        committed: Vec<DisplayState>,
        wakelock_held: bool,
    }

    impl DsmIo for FakeIo {
        fn request_renderer(&mut self, enabled: bool, _now_ms: u64) {
            self.renderer_calls.push(enabled);
        }
        fn start_fb_suspend(&mut self, _now_ms: u64) {
            self.fb_suspends += 1;
        }
        fn start_fb_resume(&mut self, _now_ms: u64) {
            self.fb_resumes += 1;
        }
        fn acquire_wakelock(&mut self) {
            self.wakelock_held = true;
        }
        fn release_wakelock_timed(&mut self, _timeout_ms: u64) {
            self.wakelock_held = false;
        }
        fn commit_display_state(&mut self, state: DisplayState, _now_ms: u64) {
            self.committed.push(state);
        }
        fn suspend_sensors(&mut self) {}
        fn resume_sensors(&mut self) {}
    }

    fn clean_inputs() -> PolicyInputs {
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
    fn on_request_settles_through_renderer_start() {
        let mut dsm = Dsm::new();
        let mut io = FakeIo::default();
        let inputs = clean_inputs();

        dsm.request(DisplayState::On);
        dsm.exec(&mut io, &inputs, 0);
        assert_eq!(dsm.renderer_ui_state, RendererUiState::Unknown);

        dsm.on_renderer_reply(RendererUiState::Enabled);
        dsm.exec(&mut io, &inputs, 10);

        assert_eq!(dsm.display_state(), DisplayState::On);
        assert_eq!(io.committed, vec![DisplayState::On]);
        assert!(io.renderer_calls.contains(&true));
    }

    #[test]
    fn idempotent_repeat_request_causes_no_extra_traffic() {
        let mut dsm = Dsm::new();
        let mut io = FakeIo::default();
        let inputs = clean_inputs();

        dsm.request(DisplayState::On);
        dsm.exec(&mut io, &inputs, 0);
        dsm.on_renderer_reply(RendererUiState::Enabled);
        dsm.exec(&mut io, &inputs, 1);
        let calls_after_first = io.renderer_calls.len();

        dsm.request(DisplayState::On);
        dsm.exec(&mut io, &inputs, 2);
        dsm.request(DisplayState::On);
        dsm.exec(&mut io, &inputs, 3);

        assert_eq!(io.renderer_calls.len(), calls_after_first);
        assert_eq!(io.committed, vec![DisplayState::On]);
    }

    #[test]
    fn peer_gone_while_waiting_for_stop_proceeds_as_success() {
        let mut dsm = Dsm::new();
        let mut io = FakeIo::default();
        let inputs = clean_inputs();

        dsm.request(DisplayState::On);
        dsm.exec(&mut io, &inputs, 0);
        dsm.on_renderer_reply(RendererUiState::Enabled);
        dsm.exec(&mut io, &inputs, 1);

        dsm.request(DisplayState::Off);
        dsm.exec(&mut io, &inputs, 2);
        assert_eq!(dsm.curr, StmState::RendererWaitStop);

        dsm.on_renderer_peer_gone();
        dsm.exec(&mut io, &inputs, 3);
        assert_eq!(io.fb_suspends, 1);

        // The real FB-Waiter reports the transition back asynchronously;
        // simulate its event here.
        dsm.on_fb_state_change(true);
        dsm.exec(&mut io, &inputs, 4);

        assert_eq!(dsm.display_state(), DisplayState::Off);
    }

    #[test]
    fn wakelock_required_everywhere_except_settled_power_off() {
        let dsm = Dsm::new();
        assert!(!dsm.wakelock_required(crate::core::types::AllowedLevel::Late));
    }

    #[test]
    fn fb_suspend_overrunning_the_led_delay_raises_the_alert_once() {
        let mut dsm = Dsm::new();
        dsm.curr = StmState::WaitSuspend;
        dsm.next = StmState::WaitSuspend;
        dsm.fb_wait_started_ms = Some(0);
        let mut io = FakeIo::default();
        let inputs = clean_inputs();

        dsm.step(&mut io, &inputs, LED_DELAY_FB_SUSPEND_RESUME_MS - 1);
        assert!(!dsm.fb_wait_alert_fired);

        dsm.step(&mut io, &inputs, LED_DELAY_FB_SUSPEND_RESUME_MS);
        assert!(dsm.fb_wait_alert_fired);
    }

    #[test]
    fn fb_wait_deadline_clears_once_the_transition_completes() {
        let mut dsm = Dsm::new();
        dsm.curr = StmState::WaitSuspend;
        dsm.next = StmState::WaitSuspend;
        dsm.fb_wait_started_ms = Some(0);
        dsm.fb_suspended = true;
        let mut io = FakeIo::default();
        let inputs = clean_inputs();

        dsm.step(&mut io, &inputs, 5);
        assert_eq!(dsm.curr, StmState::EnterPowerOff);
        assert!(dsm.fb_wait_started_ms.is_none());
    }
}
