// Author: Mode Control Entity contributors
// License: MIT

//! `DisplayCore`: the "global mutable state" container — one struct
//! owning every subsystem, held by the daemon's run loop and passed
//! callbacks via `&mut self`. Cached copies of datapipe-style inputs
//! live directly on the struct; [`publish`] is the only way external
//! code mutates them.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::backlight::Backlight;
use crate::blanking::{BlankingInputs, BlankingTimers};
use crate::core::config::Settings;
use crate::core::datapipe::Datapipe;
use crate::core::event::Event;
use crate::core::info::{DisplayInfo, InfoSnapshot};
use crate::core::msg::CoreMsg;
use crate::core::policy::PolicyInputs;
use crate::core::types::{AudioRoute, CallState, DisplayState, ExceptionUi, SystemState, TimerRole};
use crate::core::wakelock::Wakelock;
use crate::dsm::fb_waiter::FbWaiter;
use crate::dsm::renderer_ipc::RendererIpc;
use crate::dsm::{Dsm, DsmIo};
use crate::{minfo, mwarn};

const DISPLAY_ON_WAKELOCK: Wakelock = Wakelock::new("mce_display_on");
const LPM_OFF_WAKELOCK: Wakelock = Wakelock::new("mce_lpm_off");

pub struct DisplayCore {
    pub settings: Settings,

    dsm: Dsm,
    blanking: BlankingTimers,
    backlight: Backlight,
    renderer: RendererIpc,
    fb: FbWaiter,
    tx: mpsc::UnboundedSender<CoreMsg>,

    last_committed: DisplayState,
    display_state_pipe: Datapipe<DisplayState>,
    /// Settled states not yet emitted as a `display_status_ind` signal;
    /// the D-Bus signal trigger (registered once in `new`) appends here,
    /// and the daemon run loop drains it after each dispatch.
    pending_signals: Arc<Mutex<Vec<DisplayState>>>,
    /// Tracks whether `LPM_OFF_WAKELOCK` is currently held, so `rethink`
    /// only calls `acquire`/`release_now` on an actual edge rather than
    /// on every tick the LPM-OFF grace timer happens to still be armed.
    lpm_off_wakelock_held: bool,

    call_state: CallState,
    alarm_active: bool,
    charger_connected: bool,
    audio_route: AudioRoute,
    proximity_covered: bool,
    tklock_active: bool,
    exception_ui: ExceptionUi,
    system_state: SystemState,
    init_done: bool,
    shutdown_started: bool,
    packagekit_locked: bool,
    unloading_module: bool,

    cabc_mode: String,
}

/// Borrows the disjoint, non-`dsm` fields of [`DisplayCore`] so
/// `dsm.exec(&mut effects, ...)` can run alongside `&mut self.dsm` without
/// an aliasing conflict.
struct DsmEffects<'a> {
    renderer: &'a mut RendererIpc,
    fb: &'a FbWaiter,
    tx: &'a mpsc::UnboundedSender<CoreMsg>,
    backlight: &'a mut Backlight,
    blanking: &'a mut BlankingTimers,
    display_state_pipe: &'a mut Datapipe<DisplayState>,
    last_committed: &'a mut DisplayState,
}

impl DsmIo for DsmEffects<'_> {
    fn request_renderer(&mut self, enabled: bool, now_ms: u64) {
        self.renderer.set_state_req(enabled, now_ms);
    }

    fn start_fb_suspend(&mut self, now_ms: u64) {
        self.fb.start_fb_suspend(self.tx, now_ms);
    }

    fn start_fb_resume(&mut self, now_ms: u64) {
        self.fb.start_fb_resume(self.tx, now_ms);
    }

    fn acquire_wakelock(&mut self) {
        DISPLAY_ON_WAKELOCK.acquire();
    }

    fn release_wakelock_timed(&mut self, timeout_ms: u64) {
        DISPLAY_ON_WAKELOCK.release_timed(timeout_ms);
    }

    fn commit_display_state(&mut self, state: DisplayState, now_ms: u64) {
        let prev = *self.last_committed;
        *self.last_committed = state;

        if prev == DisplayState::Dim && state == DisplayState::On {
            self.blanking.on_left_dim_to_on(now_ms);
        }
        if matches!(state, DisplayState::Off | DisplayState::LpmOff) {
            self.blanking.on_enter_off_or_lpmoff();
        }

        self.backlight.apply_display_state(state, now_ms);
        self.display_state_pipe.publish(state);
        minfo!("dsm", "display state committed: {}", state.as_str());
    }

    fn suspend_sensors(&mut self) {
        minfo!("dsm", "sensors suspended for late-suspend power-off");
    }

    fn resume_sensors(&mut self) {
        minfo!("dsm", "sensors resumed");
    }
}

impl DisplayCore {
    pub fn new(settings: Settings, conn: Option<zbus::Connection>, tx: mpsc::UnboundedSender<CoreMsg>) -> Self {
        let renderer = RendererIpc::new(conn, tx.clone());
        let fb = FbWaiter::spawn(tx.clone());
        let backlight = Backlight::new(
            settings.brightness_fade_policy.clone(),
            settings.brightness_fade_step_time_ms,
            settings.brightness_fade_constant_time_ms,
            settings.hbm_timeout_ms,
        );

        let mut core = Self {
            settings,
            dsm: Dsm::new(),
            blanking: BlankingTimers::new(),
            backlight,
            renderer,
            fb,
            tx,
            last_committed: DisplayState::Off,
            display_state_pipe: Datapipe::new(DisplayState::Off),
            pending_signals: Arc::new(Mutex::new(Vec::new())),
            lpm_off_wakelock_held: false,
            call_state: CallState::None,
            alarm_active: false,
            charger_connected: false,
            audio_route: AudioRoute::Speaker,
            proximity_covered: false,
            tklock_active: false,
            exception_ui: ExceptionUi::NONE,
            system_state: SystemState::User,
            init_done: false,
            shutdown_started: false,
            packagekit_locked: false,
            unloading_module: false,
            cabc_mode: "off".to_string(),
        };

        core.backlight.set_on_level(
            core.settings.brightness_setting as u32,
            core.settings.dim_brightness_percent,
            DisplayState::Off,
            0,
        );

        let (core_delay, kill_delay, verify_delay, killer_enabled) = (
            core.settings.lipstick_core_delay_secs,
            core.settings.lipstick_kill_delay_secs,
            core.settings.lipstick_verify_delay_secs,
            core.settings.lipstick_killer_enabled,
        );
        core.renderer.configure_killer(killer_enabled, core_delay, kill_delay, verify_delay);

        let pending = core.pending_signals.clone();
        core.display_state_pipe.subscribe(move |state| pending.lock().unwrap().push(*state));

        core
    }

    /// Settled states committed since the last drain, oldest first. The
    /// daemon run loop emits one `display_status_ind` per entry.
    pub fn drain_pending_signals(&mut self) -> Vec<DisplayState> {
        std::mem::take(&mut *self.pending_signals.lock().unwrap())
    }

    pub fn display_state(&self) -> DisplayState {
        self.dsm.display_state()
    }

    pub fn cabc_mode(&self) -> &str {
        &self.cabc_mode
    }

    pub fn blanking_paused(&self) -> bool {
        self.blanking.blanking_paused()
    }

    fn policy_inputs(&self) -> PolicyInputs {
        PolicyInputs {
            renderer_ui_state: self.dsm.renderer_ui_state(),
            unloading_module: self.unloading_module,
            suspend_policy: self.settings.suspend_policy,
            call_state: self.call_state,
            alarm_active: self.alarm_active,
            exception_ui: self.exception_ui,
            system_state: self.system_state,
            init_done: self.init_done,
            shutdown_started: self.shutdown_started,
            packagekit_locked: self.packagekit_locked,
            proximity_covered: self.proximity_covered,
        }
    }

    fn blanking_inputs(&self) -> BlankingInputs {
        BlankingInputs {
            display_state: self.dsm.display_state(),
            call_state: self.call_state,
            alarm_active: self.alarm_active,
            charger_connected: self.charger_connected,
            audio_route: self.audio_route,
            proximity_covered: self.proximity_covered,
            tklock_active: self.tklock_active,
            inhibit_mode: self.settings.inhibit_mode,
            exception_ui: self.exception_ui,
        }
    }

    fn rethink(&mut self, now_ms: u64, force: bool) {
        let inputs = self.policy_inputs();
        let blanking_inputs = self.blanking_inputs();
        self.blanking.rethink_timers(blanking_inputs, &self.settings, now_ms, force);

        self.fire_expired_timers(now_ms);

        let lpm_off_timer_armed =
            self.blanking.is_armed(TimerRole::Off) && blanking_inputs.display_state == DisplayState::LpmOff;
        if lpm_off_timer_armed && !self.lpm_off_wakelock_held {
            LPM_OFF_WAKELOCK.acquire();
            self.lpm_off_wakelock_held = true;
        } else if !lpm_off_timer_armed && self.lpm_off_wakelock_held {
            LPM_OFF_WAKELOCK.release_now();
            self.lpm_off_wakelock_held = false;
        }

        let mut effects = DsmEffects {
            renderer: &mut self.renderer,
            fb: &self.fb,
            tx: &self.tx,
            backlight: &mut self.backlight,
            blanking: &mut self.blanking,
            display_state_pipe: &mut self.display_state_pipe,
            last_committed: &mut self.last_committed,
        };
        self.dsm.exec(&mut effects, &inputs, now_ms);

        self.backlight.hbm_tick(self.dsm.display_state(), now_ms);
        self.renderer.tick(now_ms);
    }

    /// Gate a requested display state against runtime settings before
    /// handing it to the DSM: `LpmOn` redirects to `Off` when low-power
    /// mode is disabled, so a caller cannot land in a state the settings
    /// forbid.
    fn request_display_state(&mut self, state: DisplayState) {
        let state = if state == DisplayState::LpmOn && !self.settings.low_power_mode_enabled {
            DisplayState::Off
        } else {
            state
        };
        self.dsm.request(state);
    }

    fn fire_expired_timers(&mut self, now_ms: u64) {
        for role in self.blanking.poll_expired(now_ms) {
            let next_want = match role {
                TimerRole::Dim => Some(DisplayState::Dim),
                TimerRole::Off | TimerRole::LpmOff => Some(DisplayState::Off),
                TimerRole::LpmOn => Some(DisplayState::LpmOn),
                TimerRole::PausePeriod | TimerRole::AdaptiveDim => None,
            };
            if let Some(state) = next_want {
                self.request_display_state(state);
            }
            if role == TimerRole::PausePeriod {
                self.rethink(now_ms, true);
            }
        }
    }

    pub fn handle_event(&mut self, ev: Event) {
        let now_ms = ev.now_ms();

        match ev {
            Event::Tick { .. } => {}

            Event::DisplayStateRequested { state, .. } => {
                self.request_display_state(state);
            }

            Event::RendererReply { state, .. } => {
                self.dsm.on_renderer_reply(state);
                self.renderer.on_reply_received();
            }
            Event::RendererPeerGone { .. } => {
                self.dsm.on_renderer_peer_gone();
                self.renderer.on_peer_gone();
            }
            Event::RendererPeerAppeared { .. } => {
                self.dsm.on_renderer_peer_appeared();
                self.renderer.on_peer_appeared(None);
            }

            Event::FbSuspended { .. } => self.dsm.on_fb_state_change(true),
            Event::FbResumed { .. } => self.dsm.on_fb_state_change(false),

            Event::SystemStateChanged { state, .. } => self.system_state = state,
            Event::CallStateChanged { state, .. } => self.call_state = state,
            Event::AlarmActiveChanged { active, .. } => self.alarm_active = active,
            Event::ChargerChanged { connected, .. } => self.charger_connected = connected,
            Event::AudioRouteChanged { route, .. } => self.audio_route = route,
            Event::ProximityChanged { covered, .. } => self.proximity_covered = covered,
            Event::TklockChanged { active, .. } => self.tklock_active = active,
            Event::ExceptionUiChanged { state, .. } => self.exception_ui = state,
            Event::PackageKitLockChanged { locked, .. } => self.packagekit_locked = locked,
            Event::ShutdownStarted { .. } => self.shutdown_started = true,
            Event::InitDoneChanged { done, .. } => self.init_done = done,
            Event::DesktopVisible { .. } => self.init_done = true,

            Event::BlankingPauseClientAdded { peer, .. } => {
                let display_state = self.dsm.display_state();
                if let Err(reason) = self.blanking.add_pause_client(
                    &peer,
                    display_state,
                    self.tklock_active,
                    now_ms,
                    self.settings.blank_prevent_timeout_secs,
                ) {
                    mwarn!("blanking", "pause request from {peer} denied: {reason}");
                }
            }
            Event::BlankingPauseClientRemoved { peer, .. } => {
                self.blanking.remove_pause_client(&peer);
            }

            Event::CabcModeRequested { mode, .. } => self.cabc_mode = mode,

            Event::SettingsChanged { .. } => {}
        }

        self.rethink(now_ms, false);
    }

    pub fn info_snapshot(&self) -> InfoSnapshot {
        let state = self.dsm.display_state();
        let json = DisplayInfo {
            display_state: state.as_str().to_string(),
            status: state.status_str().to_string(),
            brightness: self.backlight.cached().min(u8::MAX as u32) as u8,
            cabc_mode: self.cabc_mode.clone(),
            inhibit_mode: self.settings.inhibit_mode,
            suspend_policy: self.settings.suspend_policy,
            blanking_paused: self.blanking.blanking_paused(),
            blanking_pause_clients: self.blanking.pause_client_count(),
            low_power_mode_enabled: self.settings.low_power_mode_enabled,
            charger_connected: self.charger_connected,
        };
        let text = InfoSnapshot::render(state, &json);
        InfoSnapshot::new(json, text)
    }

    /// Dispatch a non-`Event` message: IPC/D-Bus requests that need a
    /// reply. Split from `handle_event` because these carry a reply
    /// channel the caller is waiting on.
    pub fn handle_msg(&mut self, msg: CoreMsg, now_ms: u64) {
        match msg {
            CoreMsg::Event(ev) => self.handle_event(ev),

            CoreMsg::GetDisplayStatus { reply } => {
                let _ = reply.send(self.dsm.display_state().status_str());
            }

            CoreMsg::GetCabcMode { reply } => {
                let _ = reply.send(self.cabc_mode.clone());
            }

            CoreMsg::RequestCabcMode { mode, reply } => {
                let available = self.backlight.available_cabc_modes();
                if !available.is_empty() && !available.contains(&mode) {
                    let _ = reply.send(Err(format!("unsupported cabc mode: {mode}")));
                    return;
                }
                if let Err(e) = self.backlight.set_cabc_mode(&mode) {
                    mwarn!("cabc", "set_cabc_mode({mode}) failed: {e}");
                }
                self.cabc_mode = mode.clone();
                let _ = reply.send(Ok(mode));
            }

            CoreMsg::RequestDisplayState { state, reply } => {
                let inputs = self.policy_inputs();
                let reason = crate::core::policy::reason_to_block_display_on(&inputs);
                if reason != "allowed" && state != DisplayState::Off {
                    let _ = reply.send(Err(reason.to_string()));
                    return;
                }
                self.request_display_state(state);
                self.rethink(now_ms, false);
                let _ = reply.send(Ok(()));
            }

            CoreMsg::PauseBlanking { peer, reply } => {
                let display_state = self.dsm.display_state();
                match self.blanking.add_pause_client(
                    &peer,
                    display_state,
                    self.tklock_active,
                    now_ms,
                    self.settings.blank_prevent_timeout_secs,
                ) {
                    Ok(()) => {
                        self.rethink(now_ms, true);
                        let _ = reply.send(Ok(()));
                    }
                    Err(reason) => {
                        let _ = reply.send(Err(reason.to_string()));
                    }
                }
            }

            CoreMsg::CancelBlankingPause { peer, reply } => {
                self.blanking.remove_pause_client(&peer);
                self.rethink(now_ms, true);
                let _ = reply.send(Ok(()));
            }

            CoreMsg::GetInfo { reply } => {
                let _ = reply.send(self.info_snapshot());
            }

            CoreMsg::ReloadConfig { reply } => {
                let _ = reply.send(Ok("reload not yet applied; restart mced to pick up config changes".to_string()));
            }

            CoreMsg::StopDaemon { reply } => {
                self.shutdown();
                let _ = reply.send(Ok("shutting down".to_string()));
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.unloading_module = true;
        self.fb.shutdown();
        LPM_OFF_WAKELOCK.release_now();
        self.lpm_off_wakelock_held = false;
        DISPLAY_ON_WAKELOCK.release_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fresh core plus its message channel's receiving end, with
    /// `init_done` already latched so the DSM settles into `StayPowerOff`
    /// on late suspend instead of churning through the boot-time window
    /// where only early suspend is permitted.
    fn new_core(settings: Settings) -> (DisplayCore, mpsc::UnboundedReceiver<CoreMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut core = DisplayCore::new(settings, None, tx);
        core.handle_event(Event::InitDoneChanged { done: true, now_ms: 0 });
        (core, rx)
    }

    /// Drains every `CoreMsg::Event` the DSM queued onto its own channel
    /// (renderer replies, fb suspend/resume) and feeds each back through
    /// `handle_event`, the way the daemon run loop would across several
    /// polls — until the channel runs dry or a runaway guard trips.
    fn settle(core: &mut DisplayCore, rx: &mut mpsc::UnboundedReceiver<CoreMsg>) {
        for _ in 0..32 {
            match rx.try_recv() {
                Ok(CoreMsg::Event(ev)) => core.handle_event(ev),
                Ok(_) => {}
                Err(_) => return,
            }
        }
    }

    fn fast_settings() -> Settings {
        let mut s = Settings::default();
        s.disp_dim_timeout = 1;
        s.disp_blank_timeout = 1;
        s
    }

    #[test]
    fn on_request_settles_to_on() {
        let (mut core, mut rx) = new_core(fast_settings());
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::On);
    }

    #[test]
    fn on_then_off_settles_to_off() {
        let (mut core, mut rx) = new_core(fast_settings());
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::On);

        core.handle_event(Event::DisplayStateRequested { state: DisplayState::Off, now_ms: 10 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::Off);
    }

    #[test]
    fn idle_display_auto_dims_then_blanks() {
        let (mut core, mut rx) = new_core(fast_settings());
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::On);

        // Past the 1s dim timeout: the armed Dim timer should fire and
        // drive a renegotiated transition down to Dim.
        core.handle_event(Event::Tick { now_ms: 1_500 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::Dim);

        // Past the 1s blank timeout counted from when Dim armed its Off
        // timer: settles all the way to Off.
        core.handle_event(Event::Tick { now_ms: 3_000 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::Off);
    }

    #[test]
    fn blanking_pause_prevents_auto_dim() {
        let (mut core, mut rx) = new_core(fast_settings());
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);

        core.handle_event(Event::BlankingPauseClientAdded { peer: "app".to_string(), now_ms: 0 });
        assert!(core.blanking_paused());

        core.handle_event(Event::Tick { now_ms: 5_000 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::On);

        core.handle_event(Event::BlankingPauseClientRemoved { peer: "app".to_string(), now_ms: 5_000 });
        assert!(!core.blanking_paused());

        core.handle_event(Event::Tick { now_ms: 7_000 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::Dim);
    }

    #[test]
    fn cabc_mode_request_is_reflected_in_info_snapshot() {
        let (mut core, _rx) = new_core(Settings::default());
        core.handle_event(Event::CabcModeRequested { mode: "soft".to_string(), now_ms: 0 });
        assert_eq!(core.cabc_mode(), "soft");
        assert_eq!(core.info_snapshot().json.cabc_mode, "soft");
    }

    #[test]
    fn drain_pending_signals_reports_each_settled_state_once() {
        let (mut core, mut rx) = new_core(fast_settings());
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);

        let first_drain = core.drain_pending_signals();
        assert!(first_drain.contains(&DisplayState::On));
        assert!(core.drain_pending_signals().is_empty());
    }

    #[test]
    fn lpm_on_request_redirects_to_off_when_low_power_mode_disabled() {
        let mut settings = fast_settings();
        assert!(!settings.low_power_mode_enabled);
        settings.low_power_mode_enabled = false;
        let (mut core, mut rx) = new_core(settings);

        let sequence = [
            DisplayState::Off,
            DisplayState::On,
            DisplayState::Dim,
            DisplayState::On,
            DisplayState::LpmOn,
            DisplayState::On,
        ];
        let expected = [
            DisplayState::Off,
            DisplayState::On,
            DisplayState::Dim,
            DisplayState::On,
            DisplayState::Off,
            DisplayState::On,
        ];

        for (i, (state, want)) in sequence.iter().zip(expected.iter()).enumerate() {
            let now_ms = i as u64 * 100;
            core.handle_event(Event::DisplayStateRequested { state: *state, now_ms });
            settle(&mut core, &mut rx);
            assert_eq!(core.display_state(), *want, "step {i}: requested {state:?}");
        }
    }

    #[test]
    fn lpm_on_request_settles_to_lpm_on_when_low_power_mode_enabled() {
        let mut settings = fast_settings();
        settings.low_power_mode_enabled = true;
        let (mut core, mut rx) = new_core(settings);

        core.handle_event(Event::DisplayStateRequested { state: DisplayState::On, now_ms: 0 });
        settle(&mut core, &mut rx);
        core.handle_event(Event::DisplayStateRequested { state: DisplayState::LpmOn, now_ms: 100 });
        settle(&mut core, &mut rx);
        assert_eq!(core.display_state(), DisplayState::LpmOn);
    }
}
