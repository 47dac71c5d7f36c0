// Author: Mode Control Entity contributors
// License: MIT

//! System-bus signal consumers: each stream runs in its own spawned task
//! on the connection's executor and forwards a translated `Event` into
//! the main loop's `CoreMsg` channel. Modeled on the listener-per-signal
//! layout the renderer's D-Bus plumbing already used for login1/UPower.

use futures::StreamExt;
use tokio::sync::mpsc;
use zbus::{Connection, MatchRule};

use crate::core::event::Event;
use crate::core::msg::CoreMsg;
use crate::{merror, minfo, mwarn};

const LIPSTICK_DEST: &str = "org.nemomobile.lipstick";

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Spawns all consumed-signal listeners on `conn`. Each listener degrades
/// to a logged warning and no-op if its match rule cannot be installed;
/// a missing signal source should not prevent the daemon from running.
pub async fn spawn_consumers(conn: &Connection, tx: mpsc::UnboundedSender<CoreMsg>) {
    spawn_desktop_visible(conn, tx.clone()).await;
    spawn_dsme_signals(conn, tx.clone()).await;
    spawn_name_owner_changed(conn, tx).await;
}

fn signal_rule(interface: &str, member: &str) -> zbus::Result<MatchRule<'static>> {
    Ok(MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(interface)?
        .member(member)?
        .build())
}

async fn spawn_desktop_visible(conn: &Connection, tx: mpsc::UnboundedSender<CoreMsg>) {
    let rule = match signal_rule("com.nokia.startup.signal", "desktop_visible") {
        Ok(r) => r,
        Err(e) => {
            mwarn!("dbus", "could not build desktop_visible match rule: {e:?}");
            return;
        }
    };

    let mut stream = match zbus::MessageStream::for_match_rule(rule, conn, None).await {
        Ok(s) => s,
        Err(e) => {
            mwarn!("dbus", "desktop_visible subscription failed: {e:?}");
            return;
        }
    };

    tokio::spawn(async move {
        while let Some(Ok(_msg)) = stream.next().await {
            minfo!("dbus", "desktop_visible received");
            let _ = tx.send(CoreMsg::Event(Event::DesktopVisible { now_ms: now_ms() }));
        }
    });
}

async fn spawn_dsme_signals(conn: &Connection, tx: mpsc::UnboundedSender<CoreMsg>) {
    for member in ["shutdown_ind", "thermal_shutdown_ind", "battery_empty_ind"] {
        let rule = match signal_rule("com.nokia.dsme.signal", member) {
            Ok(r) => r,
            Err(e) => {
                mwarn!("dbus", "could not build {member} match rule: {e:?}");
                continue;
            }
        };

        let mut stream = match zbus::MessageStream::for_match_rule(rule, conn, None).await {
            Ok(s) => s,
            Err(e) => {
                mwarn!("dbus", "{member} subscription failed: {e:?}");
                continue;
            }
        };

        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(Ok(_msg)) = stream.next().await {
                minfo!("dbus", "{member} received, latching shutdown");
                let _ = tx.send(CoreMsg::Event(Event::ShutdownStarted { now_ms: now_ms() }));
            }
        });
    }
}

async fn spawn_name_owner_changed(conn: &Connection, tx: mpsc::UnboundedSender<CoreMsg>) {
    let rule = match signal_rule("org.freedesktop.DBus", "NameOwnerChanged") {
        Ok(r) => r,
        Err(e) => {
            mwarn!("dbus", "could not build NameOwnerChanged match rule: {e:?}");
            return;
        }
    };

    let mut stream = match zbus::MessageStream::for_match_rule(rule, conn, None).await {
        Ok(s) => s,
        Err(e) => {
            merror!("dbus", "NameOwnerChanged subscription failed: {e:?}");
            return;
        }
    };

    tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            let body = msg.body();
            let parsed: Result<(String, String, String), _> = body.deserialize();
            let Ok((name, old_owner, new_owner)) = parsed else { continue };

            if name != LIPSTICK_DEST {
                continue;
            }

            let t = now_ms();
            if old_owner.is_empty() && !new_owner.is_empty() {
                minfo!("dbus", "renderer peer appeared ({new_owner})");
                let _ = tx.send(CoreMsg::Event(Event::RendererPeerAppeared { now_ms: t }));
            } else if !old_owner.is_empty() && new_owner.is_empty() {
                mwarn!("dbus", "renderer peer gone ({old_owner})");
                let _ = tx.send(CoreMsg::Event(Event::RendererPeerGone { now_ms: t }));
            }
        }
    });
}
