// Author: Mode Control Entity contributors
// License: MIT

//! Wires the exposed request/signal interface and the consumed-signal
//! listeners onto one system-bus connection and hands the registered
//! `SignalEmitter` back to the daemon loop so it can push
//! `display_status_ind` without holding its own object-server handle.

pub mod consumer;
pub mod service;

use tokio::sync::mpsc;
use zbus::Connection;

use crate::core::msg::CoreMsg;
use crate::mwarn;
use service::{DisplayRequestService, BUS_NAME, OBJECT_PATH};

/// Connects to the system bus, registers the request interface under
/// [`BUS_NAME`]/[`OBJECT_PATH`], and spawns the consumed-signal listeners.
/// Returns `None` if the system bus is unreachable; the daemon runs with
/// D-Bus disabled rather than failing to start.
pub async fn connect(tx: mpsc::UnboundedSender<CoreMsg>) -> Option<Connection> {
    let conn = match Connection::system().await {
        Ok(c) => c,
        Err(e) => {
            mwarn!("dbus", "could not connect to system bus: {e:?}");
            return None;
        }
    };

    let service = DisplayRequestService::new(tx.clone());
    if let Err(e) = conn.object_server().at(OBJECT_PATH, service).await {
        mwarn!("dbus", "could not register request interface: {e:?}");
        return Some(conn);
    }
    if let Err(e) = conn.request_name(BUS_NAME).await {
        mwarn!("dbus", "could not claim bus name {BUS_NAME}: {e:?}");
    }

    consumer::spawn_consumers(&conn, tx).await;

    Some(conn)
}

/// Emits `display_status_ind` for each drained state, using the interface
/// instance already registered on `conn`'s object server.
pub async fn emit_display_status(conn: &Connection, status: &str) {
    let iface_ref = match conn
        .object_server()
        .interface::<_, DisplayRequestService>(OBJECT_PATH)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            mwarn!("dbus", "display_status_ind skipped, interface not registered: {e:?}");
            return;
        }
    };

    let emitter = iface_ref.signal_emitter();
    if let Err(e) = DisplayRequestService::display_status_ind(emitter, status).await {
        mwarn!("dbus", "display_status_ind emit failed: {e:?}");
    }
}
