// Author: Mode Control Entity contributors
// License: MIT

use tokio::sync::{mpsc, watch};

use crate::core::context::DisplayCore;
use crate::core::msg::CoreMsg;
use crate::{minfo, mwarn};

use super::{AnyError, Daemon};

impl Daemon {
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Result<(), AnyError> {
        minfo!("daemon", "starting");

        let (tx, mut rx) = mpsc::unbounded_channel::<CoreMsg>();

        let conn = crate::dbus::connect(tx.clone()).await;
        if conn.is_some() {
            minfo!("daemon", "system bus connection established");
        } else {
            mwarn!("daemon", "running with D-Bus disabled");
        }

        self.core = Some(DisplayCore::new(self.settings.clone(), conn.clone(), tx.clone()));

        if let Err(e) = crate::ipc::server::spawn_ipc_server(tx.clone()).await {
            mwarn!("daemon", "ipc server failed to start: {e}");
        }

        tokio::spawn(crate::services::ticker::run_ticker(tx.clone()));
        tokio::spawn(crate::services::power::run_power(tx.clone()));

        minfo!("daemon", "config loaded from {}", self.config_path.display());

        let core = self.core.as_mut().expect("core constructed above");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        minfo!("daemon", "stopping (shutdown requested)");
                        break;
                    }
                }

                maybe = rx.recv() => {
                    let Some(msg) = maybe else {
                        minfo!("daemon", "stopping (event channel closed)");
                        break;
                    };

                    let now_ms = crate::core::utils::now_ms();

                    match msg {
                        CoreMsg::StopDaemon { reply } => {
                            minfo!("daemon", "stopping (stop requested via ipc)");
                            core.shutdown();
                            let _ = reply.send(Ok("shutting down".to_string()));
                            let _ = shutdown_tx.send(true);
                            drain_and_emit(core, conn.as_ref()).await;
                            break;
                        }

                        other => {
                            core.handle_msg(other, now_ms);
                            drain_and_emit(core, conn.as_ref()).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

async fn drain_and_emit(core: &mut DisplayCore, conn: Option<&zbus::Connection>) {
    let Some(conn) = conn else { return };
    for state in core.drain_pending_signals() {
        crate::dbus::emit_display_status(conn, state.status_str()).await;
    }
}
