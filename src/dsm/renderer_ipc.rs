// Author: Mode Control Entity contributors
// License: MIT

//! Renderer IPC: keeps the UI process's
//! updates-enabled state in sync via an async `setUpdatesEnabled` call with
//! a timeout-and-escalation policy for an unresponsive UI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use zbus::Connection;

use crate::core::event::Event;
use crate::core::msg::CoreMsg;
use crate::core::types::RendererUiState;
use crate::{merror, minfo, mwarn};

const LIPSTICK_DEST: &str = "org.nemomobile.lipstick";
const LIPSTICK_PATH: &str = "/org/nemomobile/lipstick";
const LIPSTICK_IFACE: &str = "org.nemomobile.lipstick";
const CALL_TIMEOUT_MS: u64 = 120_000;

const LED_TIMEOUT_INITIAL_MS: u64 = 15_000;
const LED_TIMEOUT_MIN_MS: u64 = 1_500;

/// Deadlines for the unresponsive-UI escalation chain: core-dump attempt,
/// `SIGKILL`, then a verification probe. Armed when a call is issued and
/// cancelled on any reply.
#[derive(Debug, Clone, Copy)]
struct KillerChain {
    pid: u32,
    core_dump_at_ms: u64,
    kill_at_ms: u64,
    verify_at_ms: u64,
    core_dump_sent: bool,
    kill_sent: bool,
}

pub struct RendererIpc {
    conn: Option<Connection>,
    tx: mpsc::UnboundedSender<CoreMsg>,
    generation: Arc<AtomicU64>,
    led_timeout_ms: u64,
    killer_enabled: bool,
    killer_delays_ms: (u64, u64, u64),
    killer: Option<KillerChain>,
    renderer_pid: Option<u32>,
}

impl RendererIpc {
    pub fn new(conn: Option<Connection>, tx: mpsc::UnboundedSender<CoreMsg>) -> Self {
        Self {
            conn,
            tx,
            generation: Arc::new(AtomicU64::new(0)),
            led_timeout_ms: LED_TIMEOUT_INITIAL_MS,
            killer_enabled: false,
            killer_delays_ms: (30_000, 25_000, 5_000),
            killer: None,
            renderer_pid: None,
        }
    }

    pub fn configure_killer(&mut self, enabled: bool, core_delay_s: u64, kill_delay_s: u64, verify_delay_s: u64) {
        self.killer_enabled = enabled;
        self.killer_delays_ms = (core_delay_s * 1000, kill_delay_s * 1000, verify_delay_s * 1000);
    }

    pub fn on_peer_gone(&mut self) {
        self.renderer_pid = None;
        self.killer = None;
    }

    pub fn on_peer_appeared(&mut self, pid: Option<u32>) {
        self.renderer_pid = pid;
    }

    /// Issue (or reissue) a `setUpdatesEnabled` call. If a newer call is
    /// issued before this one's reply arrives, the shared generation
    /// counter has moved on by the time the stale call wakes up and its
    /// reply is dropped instead of being forwarded as the current state.
    pub fn set_state_req(&mut self, enabled: bool, now_ms: u64) {
        let my_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.led_timeout_ms = (self.led_timeout_ms * 3 / 4).max(LED_TIMEOUT_MIN_MS);

        if self.killer_enabled {
            if let Some(pid) = self.renderer_pid {
                self.killer = Some(KillerChain {
                    pid,
                    core_dump_at_ms: now_ms + self.killer_delays_ms.0,
                    kill_at_ms: now_ms + self.killer_delays_ms.0 + self.killer_delays_ms.1,
                    verify_at_ms: now_ms + self.killer_delays_ms.0 + self.killer_delays_ms.1 + self.killer_delays_ms.2,
                    core_dump_sent: false,
                    kill_sent: false,
                });
            }
        }

        let Some(conn) = self.conn.clone() else {
            // No bus connection (e.g. running headless in tests): treat as
            // an immediate success so the DSM is not blocked forever.
            let _ = self.tx.send(CoreMsg::Event(Event::RendererReply {
                state: if enabled { RendererUiState::Enabled } else { RendererUiState::Disabled },
                now_ms,
            }));
            return;
        };

        let tx = self.tx.clone();
        let expected_generation = my_generation;
        let generation = self.generation.clone();

        tokio::spawn(async move {
            let proxy_result = zbus::Proxy::new(&conn, LIPSTICK_DEST, LIPSTICK_PATH, LIPSTICK_IFACE).await;

            let call_result = match proxy_result {
                Ok(proxy) => {
                    tokio::time::timeout(
                        Duration::from_millis(CALL_TIMEOUT_MS),
                        proxy.call::<_, _, ()>("setUpdatesEnabled", &(enabled,)),
                    )
                    .await
                }
                Err(e) => {
                    merror!("renderer", "proxy unavailable: {e:?}");
                    return;
                }
            };

            if generation.load(Ordering::SeqCst) != expected_generation {
                return;
            }

            let now = crate::core::utils::now_ms();
            let state = match call_result {
                Ok(Ok(())) => {
                    if enabled { RendererUiState::Enabled } else { RendererUiState::Disabled }
                }
                Ok(Err(e)) => {
                    merror!("renderer", "setUpdatesEnabled failed: {e:?}");
                    RendererUiState::Error
                }
                Err(_) => {
                    mwarn!("renderer", "setUpdatesEnabled timed out");
                    RendererUiState::Error
                }
            };

            let _ = tx.send(CoreMsg::Event(Event::RendererReply { state, now_ms: now }));
        });
    }

    /// Called on reply: clears the LED timer and cancels the killer chain.
    pub fn on_reply_received(&mut self) {
        self.killer = None;
    }

    /// Drive the escalation chain forward on every tick; logs each
    /// threshold as it passes rather than performing real process control,
    /// since `mced` has no ptrace/signal story of its own to exercise here.
    pub fn tick(&mut self, now_ms: u64) {
        let Some(chain) = &mut self.killer else { return };

        if !chain.core_dump_sent && now_ms >= chain.core_dump_at_ms {
            mwarn!("renderer", "pid {} unresponsive, attempting core dump", chain.pid);
            chain.core_dump_sent = true;
        }
        if !chain.kill_sent && now_ms >= chain.kill_at_ms {
            mwarn!("renderer", "pid {} still unresponsive, sending SIGKILL", chain.pid);
            chain.kill_sent = true;
        }
        if now_ms >= chain.verify_at_ms {
            minfo!("renderer", "pid {} kill verification window elapsed", chain.pid);
            self.killer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipc() -> (RendererIpc, mpsc::UnboundedReceiver<CoreMsg>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RendererIpc::new(None, tx), rx)
    }

    #[test]
    fn headless_set_state_req_replies_synchronously() {
        let (mut r, mut rx) = ipc();
        r.set_state_req(true, 0);
        let msg = rx.try_recv().expect("a reply should be enqueued with no bus connection");
        match msg {
            CoreMsg::Event(Event::RendererReply { state, .. }) => assert_eq!(state, RendererUiState::Enabled),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn killer_chain_escalates_through_core_dump_kill_and_verify() {
        let (mut r, _rx) = ipc();
        r.killer_enabled = true;
        r.killer_delays_ms = (1_000, 500, 200);
        r.on_peer_appeared(Some(4242));
        r.set_state_req(false, 0);

        let chain = r.killer.expect("killer chain armed when a pid is known");
        assert_eq!(chain.core_dump_at_ms, 1_000);
        assert_eq!(chain.kill_at_ms, 1_500);
        assert_eq!(chain.verify_at_ms, 1_700);

        r.tick(900);
        assert!(!r.killer.unwrap().core_dump_sent);

        r.tick(1_000);
        assert!(r.killer.unwrap().core_dump_sent);
        assert!(!r.killer.unwrap().kill_sent);

        r.tick(1_500);
        assert!(r.killer.unwrap().kill_sent);

        r.tick(1_700);
        assert!(r.killer.is_none());
    }

    #[test]
    fn killer_chain_not_armed_without_a_known_pid() {
        let (mut r, _rx) = ipc();
        r.killer_enabled = true;
        r.set_state_req(false, 0);
        assert!(r.killer.is_none());
    }

    #[test]
    fn on_peer_gone_clears_pid_and_cancels_chain() {
        let (mut r, _rx) = ipc();
        r.killer_enabled = true;
        r.on_peer_appeared(Some(1));
        r.set_state_req(false, 0);
        assert!(r.killer.is_some());

        r.on_peer_gone();
        assert!(r.killer.is_none());
        assert!(r.renderer_pid.is_none());
    }

    #[test]
    fn superseding_a_call_bumps_the_generation_counter_past_the_stale_snapshot() {
        let (mut r, _rx) = ipc();
        let first = r.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let second = r.generation.fetch_add(1, Ordering::SeqCst) + 1;
        assert_ne!(first, second);
        assert_eq!(r.generation.load(Ordering::SeqCst), second);
    }

    #[test]
    fn led_timeout_shrinks_toward_the_floor_on_repeated_requests() {
        let (mut r, _rx) = ipc();
        assert_eq!(r.led_timeout_ms, LED_TIMEOUT_INITIAL_MS);
        for _ in 0..50 {
            r.set_state_req(true, 0);
        }
        assert_eq!(r.led_timeout_ms, LED_TIMEOUT_MIN_MS);
    }
}
