// Author: Mode Control Entity contributors
// License: MIT

use std::fmt;

/// Error taxonomy for the display core.
///
/// Most variants are recovered locally (see module docs in `dsm` and
/// `backlight`); only [`Error::InvalidRequest`] ever reaches an external
/// caller, via a method-call reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A setting or sysfs path was missing at load time; compiled defaults
    /// were substituted.
    ConfigMissing(String),

    /// A sysfs file this component depends on does not exist; the
    /// corresponding feature (CABC/HBM/LPM/hw-fade) is gated off.
    SysfsUnavailable(String),

    /// A specific sysfs read/write failed; the descriptor is closed and
    /// retried on next use.
    IoFailed { path: String, reason: String },

    /// A D-Bus method call (renderer IPC) did not reply within its
    /// configured timeout.
    IpcTimeout,

    /// The D-Bus peer disappeared while a call was pending. The DSM
    /// treats this as success and proceeds without UI cooperation.
    IpcPeerGone,

    /// The D-Bus peer replied with an error.
    IpcError(String),

    /// An external request was rejected because it is invalid given the
    /// current policy/state. Carries a human-readable reason.
    InvalidRequest(String),

    /// An impossible state-machine transition was reached. Unrecoverable.
    Fatal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ConfigMissing(what) => write!(f, "config missing: {what}"),
            Error::SysfsUnavailable(path) => write!(f, "sysfs unavailable: {path}"),
            Error::IoFailed { path, reason } => write!(f, "io failed on {path}: {reason}"),
            Error::IpcTimeout => write!(f, "renderer ipc timed out"),
            Error::IpcPeerGone => write!(f, "renderer ipc peer gone"),
            Error::IpcError(msg) => write!(f, "renderer ipc error: {msg}"),
            Error::InvalidRequest(reason) => write!(f, "request denied: {reason}"),
            Error::Fatal(msg) => write!(f, "fatal: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
