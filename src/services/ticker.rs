// Author: Mode Control Entity contributors
// License: MIT

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

use crate::core::event::Event;
use crate::core::msg::CoreMsg;
use crate::{minfo, mwarn};

pub async fn run_ticker(tx: UnboundedSender<CoreMsg>) {
    minfo!("ticker", "started");

    loop {
        sleep(Duration::from_millis(200)).await;

        let now_ms = crate::core::utils::now_ms();
        if tx.send(CoreMsg::Event(Event::Tick { now_ms })).is_err() {
            mwarn!("ticker", "stopping (receiver dropped)");
            break;
        }
    }
}
