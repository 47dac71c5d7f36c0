// Author: Mode Control Entity contributors
// License: MIT

//! The event-loop message envelope. Every external trigger — a kernel
//! notification, a D-Bus method call, a local IPC command, a timer firing
//! — becomes a `CoreMsg` pushed onto the same channel, so all mutation of
//! [`crate::core::context::DisplayCore`] happens on the single cooperative
//! loop task.

use tokio::sync::oneshot;

use crate::core::event::Event;
use crate::core::info::InfoSnapshot;
use crate::core::types::DisplayState;

pub type Reply<T> = oneshot::Sender<Result<T, String>>;

#[derive(Debug)]
pub enum CoreMsg {
    Event(Event),

    GetDisplayStatus { reply: oneshot::Sender<&'static str> },
    GetCabcMode { reply: oneshot::Sender<String> },
    RequestCabcMode { mode: String, reply: Reply<String> },

    RequestDisplayState { state: DisplayState, reply: Reply<()> },

    PauseBlanking { peer: String, reply: Reply<()> },
    CancelBlankingPause { peer: String, reply: Reply<()> },

    GetInfo { reply: oneshot::Sender<InfoSnapshot> },

    ReloadConfig { reply: Reply<String> },
    StopDaemon { reply: Reply<String> },
}
