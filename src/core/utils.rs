// Author: Mode Control Entity contributors
// License: MIT

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Charger presence, probed the same way the kernel's power-supply class
/// reports it: scan `/sys/class/power_supply/*`, look for a `Mains`-typed
/// supply (or one of the legacy `AC*`/`ADP*`/`ACAD` names) that is online.
pub fn is_charger_connected() -> bool {
    let Ok(entries) = std::fs::read_dir("/sys/class/power_supply/") else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if let Ok(typ) = std::fs::read_to_string(path.join("type")) {
            if typ.trim() == "Mains" && is_online(&path) {
                return true;
            }
        }

        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if ["AC", "AC0", "ADP", "ADP0", "ACAD"]
                .iter()
                .any(|p| name.starts_with(p))
                && is_online(&path)
            {
                return true;
            }
        }
    }

    false
}

fn is_online(power_supply_dir: &std::path::Path) -> bool {
    std::fs::read_to_string(power_supply_dir.join("online"))
        .map(|s| s.trim() == "1")
        .unwrap_or(false)
}
