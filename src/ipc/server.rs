// Author: Mode Control Entity contributors
// License: MIT

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixListener,
    sync::mpsc,
};

use crate::core::msg::CoreMsg;
use crate::{merror, minfo, mwarn};

pub async fn spawn_ipc_server(tx: mpsc::UnboundedSender<CoreMsg>) -> Result<(), String> {
    let path = crate::ipc::socket_path()?;

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path)
        .map_err(|e| format!("failed to bind ipc socket {}: {e}", path.display()))?;

    minfo!("ipc", "listening on {}", path.display());

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(x) => x,
                Err(e) => {
                    merror!("ipc", "accept failed: {e}");
                    continue;
                }
            };

            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stream.read_to_end(&mut buf).await {
                    mwarn!("ipc", "read failed: {e}");
                    return;
                }

                let cmd = String::from_utf8_lossy(&buf).trim().to_string();
                if cmd.is_empty() {
                    let _ = stream.write_all(b"ERROR: empty command").await;
                    let _ = stream.shutdown().await;
                    return;
                }

                let response = crate::ipc::router::route_command(&cmd, &tx).await;

                if let Err(e) = stream.write_all(response.as_bytes()).await {
                    mwarn!("ipc", "write failed: {e}");
                    return;
                }
                let _ = stream.shutdown().await;
            });
        }
    });

    Ok(())
}
