// Author: Mode Control Entity contributors
// License: MIT

use crate::cli::{Args, Command};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

pub async fn run(args: Args) -> Result<(), AnyError> {
    let cmd = args.command.as_ref().expect("command mode");

    let ipc_cmd = match cmd {
        Command::Status => "status".to_string(),
        Command::On => "on".to_string(),
        Command::Dim => "dim".to_string(),
        Command::Off => "off".to_string(),
        Command::Cabc { mode } => format!("cabc {mode}"),
        Command::PauseBlanking => "pause-blanking".to_string(),
        Command::ResumeBlanking => "resume-blanking".to_string(),
        Command::Reload => "reload".to_string(),
        Command::Stop => "stop".to_string(),
        Command::Info { json } => {
            if *json {
                "info --json".to_string()
            } else {
                "info".to_string()
            }
        }
    };

    match crate::ipc::client::send_raw(&ipc_cmd).await {
        Ok(resp) => {
            let out = resp.trim_end();
            if !out.is_empty() {
                println!("{out}");
            }
        }
        Err(e) => {
            if matches!(cmd, Command::Info { json: true }) {
                println!(r#"{{"error":"{e}"}}"#);
            } else {
                eprintln!("mced: {e}");
            }
        }
    }

    Ok(())
}
