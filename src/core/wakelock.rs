// Author: Mode Control Entity contributors
// License: MIT

//! Thin wrapper over the kernel's `/sys/power/wake_lock` /
//! `/sys/power/wake_unlock` interface. `acquire` takes an indefinite lock;
//! `release_timed` downgrades to a kernel-timed lock rather than an
//! immediate unlock, so the DSM has time to reach a sleep-stable state
//! before autosuspend can proceed.

use std::fs::OpenOptions;
use std::io::Write;

use crate::mwarn;

const WAKE_LOCK_PATH: &str = "/sys/power/wake_lock";
const WAKE_UNLOCK_PATH: &str = "/sys/power/wake_unlock";

pub struct Wakelock {
    name: &'static str,
}

impl Wakelock {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }

    pub fn acquire(&self) {
        if let Err(e) = write_token(WAKE_LOCK_PATH, self.name) {
            mwarn!("wakelock", "acquire {} failed: {e}", self.name);
        }
    }

    pub fn release_timed(&self, timeout_ms: u64) {
        let token = format!("{} {}", self.name, timeout_ms * 1_000_000);
        if let Err(e) = write_token(WAKE_LOCK_PATH, &token) {
            mwarn!("wakelock", "timed release of {} failed: {e}", self.name);
        }
    }

    pub fn release_now(&self) {
        if let Err(e) = write_token(WAKE_UNLOCK_PATH, self.name) {
            mwarn!("wakelock", "release {} failed: {e}", self.name);
        }
    }
}

fn write_token(path: &str, token: &str) -> std::io::Result<()> {
    let mut f = OpenOptions::new().write(true).open(path)?;
    f.write_all(token.as_bytes())
}
