// Author: Mode Control Entity contributors
// License: MIT

//! Sysfs probing: an ordered list of `{display_id, path-template}`
//! descriptors scanned by a single probe function, with a generic
//! backlight-class scan as the last resort, rather than a cascade of
//! device-specific checks.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::Error;

struct Descriptor {
    display_id: &'static str,
    base_path: &'static str,
}

const KNOWN: &[Descriptor] = &[
    Descriptor { display_id: "acx565akm", base_path: "/sys/class/backlight/acx565akm" },
    Descriptor { display_id: "display0", base_path: "/sys/class/backlight/display0" },
    Descriptor { display_id: "panel", base_path: "/sys/class/backlight/panel" },
    Descriptor { display_id: "lcd-backlight", base_path: "/sys/class/leds/lcd-backlight" },
];

#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    pub display_id: String,
    base: PathBuf,
    pub supports_cabc: bool,
    pub supports_hbm: bool,
    pub supports_lpm: bool,
    pub supports_hw_dimming: bool,
}

impl SysfsBacklight {
    /// Scan the known descriptor list, then fall back to any entry under
    /// `/sys/class/backlight/*`. Returns `None` if nothing is found —
    /// callers treat the backlight as entirely unsupported (CABC/HBM/LPM
    /// become no-ops) rather than failing startup.
    pub fn probe() -> Option<Self> {
        for d in KNOWN {
            let base = Path::new(d.base_path);
            if base.join("brightness").exists() {
                return Some(Self::from_base(d.display_id.to_string(), base));
            }
        }

        if let Ok(entries) = fs::read_dir("/sys/class/backlight") {
            for entry in entries.flatten() {
                let base = entry.path();
                if base.join("brightness").exists() {
                    let id = base.file_name().and_then(|n| n.to_str()).unwrap_or("generic").to_string();
                    return Some(Self::from_base(id, &base));
                }
            }
        }

        None
    }

    fn from_base(display_id: String, base: &Path) -> Self {
        Self {
            display_id,
            base: base.to_path_buf(),
            supports_cabc: base.join("cabc_mode").exists(),
            supports_hbm: base.join("hbm").exists(),
            supports_lpm: base.join("lpm").exists(),
            supports_hw_dimming: base.join("hw_dimming").exists(),
        }
    }

    pub fn read_max_brightness(&self) -> Result<u32, Error> {
        read_u32(&self.base.join("max_brightness"))
    }

    pub fn write_brightness(&self, value: u32) -> Result<(), Error> {
        write_str(&self.base.join("brightness"), &value.to_string())
    }

    pub fn write_cabc_mode(&self, mode: &str) -> Result<(), Error> {
        if !self.supports_cabc {
            return Err(Error::SysfsUnavailable("cabc_mode".into()));
        }
        write_str(&self.base.join("cabc_mode"), mode)
    }

    pub fn read_available_cabc_modes(&self) -> Result<Vec<String>, Error> {
        if !self.supports_cabc {
            return Err(Error::SysfsUnavailable("available_cabc_modes".into()));
        }
        let path = self.base.join("available_cabc_modes");
        let text = fs::read_to_string(&path)
            .map_err(|e| Error::IoFailed { path: path.display().to_string(), reason: e.to_string() })?;
        Ok(text.split_whitespace().map(str::to_string).collect())
    }

    pub fn write_hw_dimming(&self, enabled: bool) -> Result<(), Error> {
        if !self.supports_hw_dimming {
            return Err(Error::SysfsUnavailable("hw_dimming".into()));
        }
        write_str(&self.base.join("hw_dimming"), if enabled { "1" } else { "0" })
    }

    pub fn write_hbm(&self, value: u32) -> Result<(), Error> {
        if !self.supports_hbm {
            return Err(Error::SysfsUnavailable("hbm".into()));
        }
        write_str(&self.base.join("hbm"), &value.to_string())
    }

    pub fn write_lpm(&self, value: u32) -> Result<(), Error> {
        if !self.supports_lpm {
            return Err(Error::SysfsUnavailable("lpm".into()));
        }
        write_str(&self.base.join("lpm"), &value.to_string())
    }
}

fn write_str(path: &Path, value: &str) -> Result<(), Error> {
    fs::write(path, value).map_err(|e| Error::IoFailed { path: path.display().to_string(), reason: e.to_string() })
}

fn read_u32(path: &Path) -> Result<u32, Error> {
    let text = fs::read_to_string(path)
        .map_err(|e| Error::IoFailed { path: path.display().to_string(), reason: e.to_string() })?;
    text.trim()
        .parse()
        .map_err(|_| Error::IoFailed { path: path.display().to_string(), reason: "not an integer".into() })
}
