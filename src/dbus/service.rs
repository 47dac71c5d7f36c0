// Author: Mode Control Entity contributors
// License: MIT

//! The exposed D-Bus request/signal interface. Each method
//! round-trips through the main loop's `CoreMsg` channel so all state
//! mutation happens on the single cooperative thread, then replies.

use tokio::sync::{mpsc, oneshot};
use zbus::object_server::SignalEmitter;
use zbus::message::Header;

use crate::core::msg::CoreMsg;
use crate::core::types::DisplayState;

pub const BUS_NAME: &str = "com.nokia.mce";
pub const OBJECT_PATH: &str = "/com/nokia/mce/request";
pub const REQUEST_IFACE: &str = "com.nokia.mce.request";
pub const SIGNAL_IFACE: &str = "com.nokia.mce.signal";

pub struct DisplayRequestService {
    tx: mpsc::UnboundedSender<CoreMsg>,
}

impl DisplayRequestService {
    pub fn new(tx: mpsc::UnboundedSender<CoreMsg>) -> Self {
        Self { tx }
    }

    fn peer_id(header: &Header<'_>) -> String {
        header
            .sender()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown-peer".to_string())
    }

    async fn request_state(&self, state: DisplayState) -> zbus::fdo::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::RequestDisplayState { state, reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(zbus::fdo::Error::Failed(reason)),
            Err(_) => Err(zbus::fdo::Error::Failed("no reply from core loop".into())),
        }
    }
}

#[zbus::interface(name = "com.nokia.mce.request")]
impl DisplayRequestService {
    async fn get_display_status(&self) -> zbus::fdo::Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::GetDisplayStatus { reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;
        reply_rx.await.map(|s| s.to_string()).map_err(|_| zbus::fdo::Error::Failed("no reply".into()))
    }

    async fn get_cabc_mode(&self) -> zbus::fdo::Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::GetCabcMode { reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;
        reply_rx.await.map_err(|_| zbus::fdo::Error::Failed("no reply".into()))
    }

    async fn req_display_state_on(&self) -> zbus::fdo::Result<()> {
        self.request_state(DisplayState::On).await
    }

    async fn req_display_state_dim(&self) -> zbus::fdo::Result<()> {
        self.request_state(DisplayState::Dim).await
    }

    async fn req_display_state_off(&self) -> zbus::fdo::Result<()> {
        self.request_state(DisplayState::Off).await
    }

    async fn req_cabc_mode(&self, mode: String) -> zbus::fdo::Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::RequestCabcMode { mode, reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;

        match reply_rx.await {
            Ok(Ok(echoed)) => Ok(echoed),
            Ok(Err(reason)) => Err(zbus::fdo::Error::Failed(reason)),
            Err(_) => Err(zbus::fdo::Error::Failed("no reply from core loop".into())),
        }
    }

    async fn req_display_blanking_pause(&self, #[zbus(header)] header: Header<'_>) -> zbus::fdo::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::PauseBlanking { peer: Self::peer_id(&header), reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(zbus::fdo::Error::Failed(reason)),
            Err(_) => Err(zbus::fdo::Error::Failed("no reply from core loop".into())),
        }
    }

    async fn req_display_cancel_blanking_pause(&self, #[zbus(header)] header: Header<'_>) -> zbus::fdo::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(CoreMsg::CancelBlankingPause { peer: Self::peer_id(&header), reply: reply_tx })
            .map_err(|_| zbus::fdo::Error::Failed("core loop gone".into()))?;

        match reply_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(zbus::fdo::Error::Failed(reason)),
            Err(_) => Err(zbus::fdo::Error::Failed("no reply from core loop".into())),
        }
    }

    /// Emitted on every settled state change; never while mid-transition.
    #[zbus(signal)]
    pub async fn display_status_ind(emitter: &SignalEmitter<'_>, status: &str) -> zbus::Result<()>;
}
