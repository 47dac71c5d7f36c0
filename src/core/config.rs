// Author: Mode Control Entity contributors
// License: MIT

//! Compiled-in defaults and the typed settings struct, mirroring the
//! settings keys exposed to configuration files and runtime setting
//! changes. Values are loaded from a `rune-cfg` file by `crate::config`
//! and individual fields can also be mutated at runtime by a settings
//! change notification (see `DisplayCore::apply_setting`).

use crate::core::types::{InhibitMode, SuspendPolicy};

#[derive(Debug, Clone, PartialEq)]
pub enum FadePolicy {
    StepTime,
    ConstantTime,
    Direct,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// ON -> DIM timeout, seconds.
    pub disp_dim_timeout: u64,
    /// DIM/LPM-OFF -> OFF timeout, seconds.
    pub disp_blank_timeout: u64,
    /// LPM_OFF timeout used when leaving `LpmOff`'s hold.
    pub disp_lpm_off_timeout: u64,
    /// `never_blank`: disables automatic ON -> DIM -> OFF entirely.
    pub never_blank: bool,

    pub low_power_mode_enabled: bool,

    pub adaptive_dimming_enabled: bool,
    /// Threshold timer duration (ms) that resets the adaptive index.
    pub adaptive_dimming_threshold_ms: u64,
    /// Candidate dim timeouts (seconds), indexed by `dim_timeout_index + adaptive_dimming_index`.
    pub possible_dim_timeouts: Vec<u64>,

    pub inhibit_mode: InhibitMode,

    /// Brightness step count/size for the software fade (StepTime policy).
    pub brightness_fade_step_time_ms: u64,
    /// Total fade duration for the ConstantTime policy.
    pub brightness_fade_constant_time_ms: u64,
    pub brightness_fade_policy: FadePolicy,

    pub brightness_setting: u8,
    pub dim_brightness_percent: u8,

    pub suspend_policy: SuspendPolicy,

    pub cpu_governor_override: Option<String>,

    /// Seconds before declaring the UI unresponsive.
    pub lipstick_core_delay_secs: u64,
    pub lipstick_kill_delay_secs: u64,
    pub lipstick_verify_delay_secs: u64,
    /// "devel" log-level gate for the lipstick-killer escalation; disabled
    /// by default since killing the renderer process is a destructive
    /// escalation of last resort.
    pub lipstick_killer_enabled: bool,

    pub blank_prevent_timeout_secs: u64,

    pub hbm_timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            disp_dim_timeout: 30,
            disp_blank_timeout: 3,
            disp_lpm_off_timeout: 5,
            never_blank: false,

            low_power_mode_enabled: false,

            adaptive_dimming_enabled: true,
            adaptive_dimming_threshold_ms: 5000,
            possible_dim_timeouts: vec![1, 5, 10, 15, 20, 30, 60],

            inhibit_mode: InhibitMode::Off,

            brightness_fade_step_time_ms: 10,
            brightness_fade_constant_time_ms: 0,
            brightness_fade_policy: FadePolicy::StepTime,

            brightness_setting: 60,
            dim_brightness_percent: 20,

            suspend_policy: SuspendPolicy::Enabled,

            cpu_governor_override: None,

            lipstick_core_delay_secs: 30,
            lipstick_kill_delay_secs: 25,
            lipstick_verify_delay_secs: 5,
            lipstick_killer_enabled: false,

            blank_prevent_timeout_secs: 60,

            hbm_timeout_ms: 3_000,
        }
    }
}

pub const BLANKING_PAUSE_MAX_MONITORED: usize = 5;
pub const DEFAULT_LPM_PROXIMITY_BLANK_TIMEOUT_SECS: u64 = 5;
pub const LED_DELAY_FB_SUSPEND_RESUME_MS: u64 = 1000;
