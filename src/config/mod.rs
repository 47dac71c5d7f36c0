// Author: Mode Control Entity contributors
// License: MIT

//! Settings loading: a flat `rune-cfg` file read at startup.
//! A missing or unparsable file is `ConfigMissing`/`ConfigInvalid` — logged
//! at notice and covered by falling back to [`Settings::default`], never a
//! hard failure, since the daemon should still manage the display with
//! compiled-in defaults.

use std::path::{Path, PathBuf};

use rune_cfg::RuneConfig;

use crate::core::config::{FadePolicy, Settings};
use crate::core::types::{InhibitMode, SuspendPolicy};
use crate::minfo;

/// Loaded settings plus the concrete path that supplied them, if any file
/// was found at all (an all-defaults load has no path to report).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub settings: Settings,
}

pub fn default_user_config_path() -> PathBuf {
    let dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join("mced").join("mced.rune")
}

const ETC_FALLBACK: &str = "/etc/mced/mced.rune";

/// Resolves the config path mced would use when `--config` is not given:
/// prefer the user path if it exists, else the `/etc` fallback, else the
/// user path anyway (so a subsequent load error names where we looked).
pub fn resolve_default_config_path() -> PathBuf {
    let primary = default_user_config_path();
    let fallback = PathBuf::from(ETC_FALLBACK);

    if primary.exists() {
        primary
    } else if fallback.exists() {
        fallback
    } else {
        primary
    }
}

/// Loads settings from `path`, falling back to compiled defaults on any
/// read or parse failure. Never returns `Err`: a broken config must not
/// prevent the display from being managed.
pub fn load(path: &Path) -> LoadedConfig {
    match try_load(path) {
        Ok(settings) => LoadedConfig { path: Some(path.to_path_buf()), settings },
        Err(e) => {
            minfo!("config", "{}: {e}, using compiled defaults", path.display());
            LoadedConfig { path: None, settings: Settings::default() }
        }
    }
}

fn try_load(path: &Path) -> Result<Settings, String> {
    let rc = RuneConfig::from_file(path).map_err(|e| format!("failed to read: {e}"))?;
    parse_settings(&rc)
}

fn parse_settings(rc: &RuneConfig) -> Result<Settings, String> {
    let d = Settings::default();

    let fade_policy_str = rc.get_or("brightness.fade_policy", fade_policy_name(&d.brightness_fade_policy));
    let fade_policy = match fade_policy_str.as_str() {
        "step_time" => FadePolicy::StepTime,
        "constant_time" => FadePolicy::ConstantTime,
        "direct" => FadePolicy::Direct,
        other => return Err(format!("brightness.fade_policy: unknown value \"{other}\"")),
    };

    let inhibit_mode_str = rc.get_or("blanking.inhibit_mode", inhibit_mode_name(d.inhibit_mode));
    let inhibit_mode = match inhibit_mode_str.as_str() {
        "off" => InhibitMode::Off,
        "stay_on_with_charger" => InhibitMode::StayOnWithCharger,
        "stay_dim_with_charger" => InhibitMode::StayDimWithCharger,
        "stay_on" => InhibitMode::StayOn,
        "stay_dim" => InhibitMode::StayDim,
        other => return Err(format!("blanking.inhibit_mode: unknown value \"{other}\"")),
    };

    let suspend_policy_str = rc.get_or("suspend.policy", suspend_policy_name(d.suspend_policy));
    let suspend_policy = match suspend_policy_str.as_str() {
        "disabled" => SuspendPolicy::Disabled,
        "enabled" => SuspendPolicy::Enabled,
        "early_only" => SuspendPolicy::EarlyOnly,
        other => return Err(format!("suspend.policy: unknown value \"{other}\"")),
    };

    let possible_dim_timeouts: Vec<u64> = rc
        .get_optional::<Vec<u64>>("blanking.possible_dim_timeouts")
        .map_err(|e| format!("blanking.possible_dim_timeouts: {e}"))?
        .unwrap_or(d.possible_dim_timeouts);

    let cpu_governor_override = rc
        .get_optional::<Option<String>>("suspend.cpu_governor_override")
        .map_err(|e| format!("suspend.cpu_governor_override: {e}"))?
        .flatten();

    Ok(Settings {
        disp_dim_timeout: rc.get_or("blanking.dim_timeout_secs", d.disp_dim_timeout),
        disp_blank_timeout: rc.get_or("blanking.blank_timeout_secs", d.disp_blank_timeout),
        disp_lpm_off_timeout: rc.get_or("blanking.lpm_off_timeout_secs", d.disp_lpm_off_timeout),
        never_blank: rc.get_or("blanking.never_blank", d.never_blank),

        low_power_mode_enabled: rc.get_or("blanking.low_power_mode_enabled", d.low_power_mode_enabled),

        adaptive_dimming_enabled: rc.get_or("blanking.adaptive_dimming_enabled", d.adaptive_dimming_enabled),
        adaptive_dimming_threshold_ms: rc
            .get_or("blanking.adaptive_dimming_threshold_ms", d.adaptive_dimming_threshold_ms),
        possible_dim_timeouts,

        inhibit_mode,

        brightness_fade_step_time_ms: rc
            .get_or("brightness.fade_step_time_ms", d.brightness_fade_step_time_ms),
        brightness_fade_constant_time_ms: rc
            .get_or("brightness.fade_constant_time_ms", d.brightness_fade_constant_time_ms),
        brightness_fade_policy: fade_policy,

        brightness_setting: rc.get_or("brightness.setting_percent", d.brightness_setting as u64) as u8,
        dim_brightness_percent: rc.get_or("brightness.dim_percent", d.dim_brightness_percent as u64) as u8,

        suspend_policy,
        cpu_governor_override,

        lipstick_core_delay_secs: rc.get_or("renderer.core_delay_secs", d.lipstick_core_delay_secs),
        lipstick_kill_delay_secs: rc.get_or("renderer.kill_delay_secs", d.lipstick_kill_delay_secs),
        lipstick_verify_delay_secs: rc.get_or("renderer.verify_delay_secs", d.lipstick_verify_delay_secs),
        lipstick_killer_enabled: rc.get_or("renderer.killer_enabled", d.lipstick_killer_enabled),

        blank_prevent_timeout_secs: rc.get_or("blanking.pause_timeout_secs", d.blank_prevent_timeout_secs),

        hbm_timeout_ms: rc.get_or("brightness.hbm_timeout_ms", d.hbm_timeout_ms),
    })
}

fn fade_policy_name(p: &FadePolicy) -> String {
    match p {
        FadePolicy::StepTime => "step_time",
        FadePolicy::ConstantTime => "constant_time",
        FadePolicy::Direct => "direct",
    }
    .to_string()
}

fn inhibit_mode_name(m: InhibitMode) -> String {
    match m {
        InhibitMode::Off => "off",
        InhibitMode::StayOnWithCharger => "stay_on_with_charger",
        InhibitMode::StayDimWithCharger => "stay_dim_with_charger",
        InhibitMode::StayOn => "stay_on",
        InhibitMode::StayDim => "stay_dim",
    }
    .to_string()
}

fn suspend_policy_name(p: SuspendPolicy) -> String {
    match p {
        SuspendPolicy::Disabled => "disabled",
        SuspendPolicy::Enabled => "enabled",
        SuspendPolicy::EarlyOnly => "early_only",
    }
    .to_string()
}
