// Author: Mode Control Entity contributors
// License: MIT

use tokio::{
    sync::{mpsc, oneshot},
    time::{timeout, Duration},
};

use crate::core::msg::CoreMsg;
use crate::core::types::DisplayState;

const IPC_REPLY_TIMEOUT: Duration = Duration::from_secs(2);
const NOT_RUNNING: &str = "mced not running";

pub async fn route_command(cmd: &str, tx: &mpsc::UnboundedSender<CoreMsg>) -> String {
    let cmd = cmd.trim();
    let mut parts = cmd.split_whitespace();
    let Some(verb) = parts.next() else {
        return "ERROR: empty command".to_string();
    };
    let rest: Vec<&str> = parts.collect();

    match verb {
        "status" => reply_str(tx, |reply| CoreMsg::GetDisplayStatus { reply }).await,

        "on" => reply_unit(tx, DisplayState::On).await,
        "dim" => reply_unit(tx, DisplayState::Dim).await,
        "off" => reply_unit(tx, DisplayState::Off).await,

        "cabc" => match rest.first() {
            Some(mode) => {
                let mode = mode.to_string();
                reply_result(tx, |reply| CoreMsg::RequestCabcMode { mode, reply }).await
            }
            None => "ERROR: usage: cabc <mode>".to_string(),
        },

        "pause-blanking" => {
            reply_result_unit(tx, |reply| CoreMsg::PauseBlanking { peer: "cli".to_string(), reply }).await
        }
        "resume-blanking" => {
            reply_result_unit(tx, |reply| CoreMsg::CancelBlankingPause { peer: "cli".to_string(), reply }).await
        }

        "reload" => reply_result(tx, |reply| CoreMsg::ReloadConfig { reply }).await,
        "stop" => reply_result(tx, |reply| CoreMsg::StopDaemon { reply }).await,

        "info" => {
            let as_json = rest.iter().any(|t| *t == "--json");
            let (reply_tx, reply_rx) = oneshot::channel();
            if tx.send(CoreMsg::GetInfo { reply: reply_tx }).is_err() {
                return not_running(as_json);
            }
            match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
                Ok(Ok(snapshot)) => {
                    if as_json {
                        serde_json::to_string(&snapshot.json)
                            .unwrap_or_else(|_| r#"{"error":"json encode failed"}"#.to_string())
                    } else {
                        snapshot.pretty_text
                    }
                }
                Ok(Err(_)) => not_running(as_json),
                Err(_) => "ERROR: timed out waiting for daemon".to_string(),
            }
        }

        _ => "ERROR: unknown command".to_string(),
    }
}

fn not_running(as_json: bool) -> String {
    if as_json {
        format!(r#"{{"error":"{NOT_RUNNING}"}}"#)
    } else {
        NOT_RUNNING.to_string()
    }
}

async fn reply_unit(tx: &mpsc::UnboundedSender<CoreMsg>, state: DisplayState) -> String {
    reply_result_unit(tx, |reply| CoreMsg::RequestDisplayState { state, reply }).await
}

async fn reply_result_unit(
    tx: &mpsc::UnboundedSender<CoreMsg>,
    make: impl FnOnce(oneshot::Sender<Result<(), String>>) -> CoreMsg,
) -> String {
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx.send(make(reply_tx)).is_err() {
        return NOT_RUNNING.to_string();
    }
    match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
        Ok(Ok(Ok(()))) => "OK".to_string(),
        Ok(Ok(Err(reason))) => format!("ERROR: {reason}"),
        Ok(Err(_)) => NOT_RUNNING.to_string(),
        Err(_) => "ERROR: timed out waiting for daemon".to_string(),
    }
}

async fn reply_result<T: std::fmt::Display>(
    tx: &mpsc::UnboundedSender<CoreMsg>,
    make: impl FnOnce(oneshot::Sender<Result<T, String>>) -> CoreMsg,
) -> String {
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx.send(make(reply_tx)).is_err() {
        return NOT_RUNNING.to_string();
    }
    match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
        Ok(Ok(Ok(v))) => format!("OK: {v}"),
        Ok(Ok(Err(reason))) => format!("ERROR: {reason}"),
        Ok(Err(_)) => NOT_RUNNING.to_string(),
        Err(_) => "ERROR: timed out waiting for daemon".to_string(),
    }
}

async fn reply_str(
    tx: &mpsc::UnboundedSender<CoreMsg>,
    make: impl FnOnce(oneshot::Sender<&'static str>) -> CoreMsg,
) -> String {
    let (reply_tx, reply_rx) = oneshot::channel();
    if tx.send(make(reply_tx)).is_err() {
        return NOT_RUNNING.to_string();
    }
    match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
        Ok(Ok(s)) => s.to_string(),
        Ok(Err(_)) => NOT_RUNNING.to_string(),
        Err(_) => "ERROR: timed out waiting for daemon".to_string(),
    }
}
