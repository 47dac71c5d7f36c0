// Author: Mode Control Entity contributors
// License: MIT

//! Backlight brightness pipeline: owns the current brightness value,
//! executes software fade steps on a timer, and writes the sysfs sink
//! (or treats it as unsupported if the probe found nothing).

pub mod sysfs;

use crate::core::config::FadePolicy;
use crate::core::types::DisplayState;
use sysfs::SysfsBacklight;

const DEFAULT_HBM_TIMEOUT_MS: u64 = 3_000;

struct FadeState {
    target: u32,
    step_length: u32,
    step_time_ms: u64,
    next_step_at_ms: u64,
}

pub struct Backlight {
    sink: Option<SysfsBacklight>,

    maximum: u32,
    setting_percent: u8,
    display_on: u32,
    display_dim: u32,
    display_lpm: u32,
    cached: u32,
    target: u32,
    resume: u32,

    fade: Option<FadeState>,
    fade_policy: FadePolicy,
    step_time_ms: u64,
    constant_time_ms: u64,

    hbm: HbmState,
}

struct HbmState {
    wanted: u32,
    written: u32,
    decay_deadline: Option<u64>,
    timeout_ms: u64,
}

impl Backlight {
    pub fn new(fade_policy: FadePolicy, step_time_ms: u64, constant_time_ms: u64, hbm_timeout_ms: u64) -> Self {
        let sink = SysfsBacklight::probe();
        let maximum = sink.as_ref().and_then(|s| s.read_max_brightness().ok()).unwrap_or(100);

        Self {
            sink,
            maximum,
            setting_percent: 100,
            display_on: maximum,
            display_dim: maximum / 5,
            display_lpm: maximum / 10,
            cached: 0,
            target: 0,
            resume: maximum,
            fade: None,
            fade_policy,
            step_time_ms,
            constant_time_ms,
            hbm: HbmState {
                wanted: 0,
                written: 0,
                decay_deadline: None,
                timeout_ms: if hbm_timeout_ms == 0 { DEFAULT_HBM_TIMEOUT_MS } else { hbm_timeout_ms },
            },
        }
    }

    pub fn is_supported(&self) -> bool {
        self.sink.is_some()
    }

    pub fn set_cabc_mode(&self, mode: &str) -> Result<(), crate::core::error::Error> {
        match &self.sink {
            Some(sink) => sink.write_cabc_mode(mode),
            None => Err(crate::core::error::Error::SysfsUnavailable("backlight".into())),
        }
    }

    pub fn available_cabc_modes(&self) -> Vec<String> {
        self.sink
            .as_ref()
            .and_then(|s| s.read_available_cabc_modes().ok())
            .unwrap_or_default()
    }

    pub fn cached(&self) -> u32 {
        self.cached
    }

    /// Begin (or redirect) a fade from `cached` to `new_level`.
    /// `hw_fade_supported` or a `Direct` policy jumps immediately.
    pub fn set_fade_target(&mut self, new_level: u32, hw_fade_supported: bool, now_ms: u64) {
        let new_level = new_level.min(self.maximum);

        if hw_fade_supported || self.fade_policy == FadePolicy::Direct || new_level == self.cached {
            self.force_level(new_level);
            return;
        }

        let distance = new_level.abs_diff(self.cached).max(1);
        let (step_time_ms, step_length) = self.step_plan(distance);

        self.target = new_level;
        self.fade = Some(FadeState { target: new_level, step_length, step_time_ms, next_step_at_ms: now_ms + step_time_ms });
    }

    fn step_plan(&self, distance: u32) -> (u64, u32) {
        let raw_step_ms = match self.fade_policy {
            FadePolicy::StepTime => self.step_time_ms,
            FadePolicy::ConstantTime => (self.constant_time_ms / distance as u64).max(1),
            FadePolicy::Direct => 0,
        };

        // Special case from the fade algorithm note: a computed 5 ms step
        // becomes 2 ms steps of 2 units each instead of 1 ms granularity.
        if raw_step_ms == 5 {
            (2, 2)
        } else {
            (raw_step_ms.max(1), 1)
        }
    }

    pub fn force_level(&mut self, level: u32) {
        let level = level.min(self.maximum);
        self.fade = None;
        self.cached = level;
        self.target = level;
        self.write(level);
    }

    /// Advance any in-flight fade by one step if its deadline has passed.
    pub fn tick(&mut self, now_ms: u64) {
        let Some(fade) = &mut self.fade else { return };

        if now_ms < fade.next_step_at_ms {
            return;
        }

        let target = fade.target;
        let step_length = fade.step_length;
        let step_time_ms = fade.step_time_ms;

        if self.cached.abs_diff(target) <= step_length {
            self.cached = target;
            self.fade = None;
        } else if self.cached < target {
            self.cached += step_length;
            fade.next_step_at_ms = now_ms + step_time_ms;
        } else {
            self.cached -= step_length;
            fade.next_step_at_ms = now_ms + step_time_ms;
        }

        let to_write = self.cached;
        self.write(to_write);
    }

    /// `hbm_and_level` packs an HBM nibble in the high bits and a 1..100
    /// percentage in the low byte, matching the wire format the caller
    /// receives from the settings backend.
    pub fn set_on_level(&mut self, hbm_and_level: u32, dim_percent: u8, display_state: DisplayState, now_ms: u64) {
        let hbm_nibble = (hbm_and_level >> 8) & 0xF;
        let percent = (hbm_and_level & 0xFF).clamp(1, 100);

        self.set_hbm_wanted(hbm_nibble, now_ms);

        self.display_on = self.maximum * percent / 100;
        let half_on = self.display_on / 2;
        let configured_dim = self.maximum * dim_percent as u32 / 100;
        self.display_dim = configured_dim.min(half_on).max(1);

        let target = self.target_for_state(display_state);
        let hw_fade = false;
        self.set_fade_target(target, hw_fade, now_ms);
    }

    /// Fade to the level appropriate for `display_state`. Called after the
    /// state machine has committed the new state.
    pub fn apply_display_state(&mut self, display_state: DisplayState, now_ms: u64) {
        let target = self.target_for_state(display_state);
        self.set_fade_target(target, false, now_ms);
    }

    fn target_for_state(&self, display_state: DisplayState) -> u32 {
        match display_state {
            DisplayState::On => self.display_on,
            DisplayState::Dim => self.display_dim,
            DisplayState::LpmOn => self.display_lpm,
            DisplayState::Off | DisplayState::LpmOff => 0,
            DisplayState::PoweringUp | DisplayState::PoweringDown | DisplayState::Undef => self.cached,
        }
    }

    fn set_hbm_wanted(&mut self, nibble: u32, now_ms: u64) {
        self.hbm.wanted = nibble;
        if nibble > 0 {
            self.hbm.decay_deadline = Some(now_ms + self.hbm.timeout_ms);
        }
    }

    /// HBM is forced to 0 outside `On` or mid-transition; decays to 0 once
    /// its timeout elapses.
    pub fn hbm_tick(&mut self, display_state: DisplayState, now_ms: u64) {
        let forced_off = !matches!(display_state, DisplayState::On);
        let expired = self.hbm.decay_deadline.is_some_and(|d| now_ms >= d);

        let desired = if forced_off || expired { 0 } else { self.hbm.wanted };

        if desired != self.hbm.written {
            if let Some(sink) = &self.sink {
                let _ = sink.write_hbm(desired);
            }
            self.hbm.written = desired;
        }
        if forced_off || expired {
            self.hbm.decay_deadline = None;
        }
    }

    fn write(&self, level: u32) {
        if let Some(sink) = &self.sink {
            let _ = sink.write_brightness(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bl() -> Backlight {
        let mut b = Backlight::new(FadePolicy::ConstantTime, 10, 5_000, 3_000);
        b.maximum = 100;
        b
    }

    #[test]
    fn force_level_cancels_fade_and_writes_immediately() {
        let mut b = bl();
        b.set_fade_target(80, false, 0);
        assert!(b.fade.is_some());
        b.force_level(40);
        assert!(b.fade.is_none());
        assert_eq!(b.cached(), 40);
    }

    #[test]
    fn constant_time_fade_reaches_target_in_expected_steps() {
        let mut b = bl();
        b.cached = 60;
        b.set_fade_target(80, false, 0);

        let mut now = 0u64;
        for _ in 0..40 {
            now += 250;
            b.tick(now);
        }

        assert_eq!(b.cached(), 80);
    }

    #[test]
    fn five_ms_step_becomes_two_ms_steps_of_two() {
        let b = Backlight::new(FadePolicy::ConstantTime, 10, 100, 3_000);
        // distance 20, constant_time 100ms -> raw step = 5ms -> special case.
        let (step_ms, step_len) = b.step_plan(20);
        assert_eq!((step_ms, step_len), (2, 2));
    }

    #[test]
    fn hbm_forced_off_outside_on_state() {
        let mut b = bl();
        b.set_hbm_wanted(3, 0);
        b.hbm_tick(DisplayState::Dim, 10);
        assert_eq!(b.hbm.written, 0);
    }

    #[test]
    fn dim_level_is_half_on_or_configured_whichever_smaller() {
        let mut b = bl();
        b.set_on_level(60, 80, DisplayState::On, 0);
        assert_eq!(b.display_on, 60);
        assert_eq!(b.display_dim, 30);
    }
}
