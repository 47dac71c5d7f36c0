// Author: Mode Control Entity contributors
// License: MIT

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

use crate::core::event::Event;
use crate::core::msg::CoreMsg;
use crate::core::utils;
use crate::minfo;

pub async fn run_power(tx: UnboundedSender<CoreMsg>) {
    minfo!("power", "starting charger monitor");

    let mut connected = utils::is_charger_connected();
    let _ = tx.send(CoreMsg::Event(Event::ChargerChanged { connected, now_ms: utils::now_ms() }));

    loop {
        sleep(Duration::from_secs(5)).await;

        let now_connected = utils::is_charger_connected();
        if now_connected != connected {
            connected = now_connected;
            minfo!("power", "charger {}", if connected { "connected" } else { "disconnected" });

            if tx
                .send(CoreMsg::Event(Event::ChargerChanged { connected, now_ms: utils::now_ms() }))
                .is_err()
            {
                break;
            }
        }
    }
}
