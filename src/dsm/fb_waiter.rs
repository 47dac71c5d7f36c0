// Author: Mode Control Entity contributors
// License: MIT

//! Frame-buffer suspend/resume bridge: observes kernel fb sleep/wake
//! transitions without busy-polling.
//!
//! The kernel interface is a pair of sysfs files that block on `read()`
//! until the corresponding transition occurs. We run that blocking read
//! loop on a dedicated OS thread and forward each transition to the main
//! loop as a [`CoreMsg::Event`] over the same channel every other
//! subsystem uses: one thread, one channel back to the loop, since
//! tokio's reactor gives us a simpler way to get a blocking thread's
//! result onto the async loop than a self-pipe plus fd watch would.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::core::event::Event;
use crate::core::msg::CoreMsg;
use crate::{minfo, mwarn};

const WAIT_FOR_FB_SLEEP: &str = "/sys/power/wait_for_fb_sleep";
const WAIT_FOR_FB_WAKE: &str = "/sys/power/wait_for_fb_wake";
const FB_DEVICE: &str = "/dev/fb0";

const FBIOBLANK: libc::c_ulong = 0x4611;
const FB_BLANK_UNBLANK: libc::c_int = 0;
const FB_BLANK_POWERDOWN: libc::c_int = 4;

pub struct FbWaiter {
    cancel: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
    sysfs_available: bool,
}

impl FbWaiter {
    /// Spawn the worker thread if the wait-for-fb sysfs files exist;
    /// otherwise returns a handle that uses the synchronous `FBIOBLANK`
    /// fallback path instead.
    pub fn spawn(tx: mpsc::UnboundedSender<CoreMsg>) -> Self {
        let sysfs_available = Path::new(WAIT_FOR_FB_SLEEP).exists() && Path::new(WAIT_FOR_FB_WAKE).exists();

        if !sysfs_available {
            mwarn!("fb-waiter", "wait_for_fb sysfs files absent, using FBIOBLANK fallback");
            return Self { cancel: Arc::new(AtomicBool::new(false)), handle: None, sysfs_available };
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_sleep = cancel.clone();
        let tx_sleep = tx.clone();
        let sleep_handle = std::thread::spawn(move || fb_wait_loop(WAIT_FOR_FB_SLEEP, cancel_sleep, tx_sleep, false));

        let cancel_wake = cancel.clone();
        let tx_wake = tx;
        let wake_handle = std::thread::spawn(move || fb_wait_loop(WAIT_FOR_FB_WAKE, cancel_wake, tx_wake, true));

        // Only the cancellation flag is retained; both threads are
        // PTHREAD_CANCEL_ASYNCHRONOUS-equivalent in spirit (blocked in a
        // `read()` we cannot interrupt), so shutdown just detaches them and
        // lets process exit reclaim them.
        drop(sleep_handle);
        Self { cancel, handle: Some(wake_handle), sysfs_available }
    }

    pub fn start_fb_suspend(&self, tx: &mpsc::UnboundedSender<CoreMsg>, now_ms: u64) {
        if self.sysfs_available {
            return;
        }
        ioctl_blank(FB_BLANK_POWERDOWN);
        let _ = tx.send(CoreMsg::Event(Event::FbSuspended { now_ms }));
    }

    pub fn start_fb_resume(&self, tx: &mpsc::UnboundedSender<CoreMsg>, now_ms: u64) {
        if self.sysfs_available {
            return;
        }
        ioctl_blank(FB_BLANK_UNBLANK);
        let _ = tx.send(CoreMsg::Event(Event::FbResumed { now_ms }));
    }

    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            // The thread is blocked in a foreign read() with no way to
            // interrupt it cleanly; we don't join, matching the source's
            // async-cancel-on-shutdown discipline rather than hanging exit.
            drop(h);
        }
    }
}

fn fb_wait_loop(path: &'static str, cancel: Arc<AtomicBool>, tx: mpsc::UnboundedSender<CoreMsg>, is_wake: bool) {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return;
        }

        match File::open(path) {
            Ok(mut f) => {
                let mut buf = [0u8; 1];
                if f.read(&mut buf).is_err() {
                    mwarn!("fb-waiter", "read failed on {path}, backing off");
                    std::thread::sleep(std::time::Duration::from_millis(500));
                    continue;
                }
            }
            Err(e) => {
                mwarn!("fb-waiter", "cannot open {path}: {e}");
                return;
            }
        }

        if cancel.load(Ordering::SeqCst) {
            return;
        }

        let now_ms = crate::core::utils::now_ms();
        let event = if is_wake { Event::FbResumed { now_ms } } else { Event::FbSuspended { now_ms } };
        if tx.send(CoreMsg::Event(event)).is_err() {
            return;
        }
    }
}

fn ioctl_blank(mode: libc::c_int) {
    let Ok(file) = std::fs::OpenOptions::new().write(true).open(FB_DEVICE) else {
        mwarn!("fb-waiter", "cannot open {FB_DEVICE} for FBIOBLANK fallback");
        return;
    };

    use std::os::unix::io::AsRawFd;
    let fd = file.as_raw_fd();
    let rc = unsafe { libc::ioctl(fd, FBIOBLANK, mode) };
    if rc != 0 {
        mwarn!("fb-waiter", "FBIOBLANK({mode}) failed: {}", std::io::Error::last_os_error());
    } else {
        minfo!("fb-waiter", "FBIOBLANK({mode}) ok");
    }
}
