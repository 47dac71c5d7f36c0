// Author: Mode Control Entity contributors
// License: MIT

use std::io;
use std::path::PathBuf;

use crate::cli::Args;
use crate::daemon::Daemon;
use crate::log::{self, Level, LogPolicy};

type AnyError = Box<dyn std::error::Error + Send + Sync>;

pub async fn run(args: Args) -> Result<(), AnyError> {
    let _instance_lock = crate::app::platform::acquire_single_instance_lock().map_err(|e| {
        eprintln!("{e}");
        io::Error::new(io::ErrorKind::AlreadyExists, e)
    })?;

    if args.verbose {
        log::set_level(Level::Debug);
    } else {
        log::set_level(Level::Info);
    }
    log::set_console_output(!args.no_console);

    if let Some(path) = crate::app::platform::default_log_path() {
        match log::enable_file_output(&path, LogPolicy::default()) {
            Ok(needs_blank) => {
                if needs_blank {
                    let _ = log::write_raw_blank_line(&path);
                }
                let _ = log::write_raw_line(&path, &log::run_header());
            }
            Err(e) => {
                eprintln!("mced: failed to enable file logging: {e}");
            }
        }
    }

    crate::minfo!("daemon", "mced starting");

    let config_path: PathBuf = match args.config.as_deref() {
        Some(p) => p.to_path_buf(),
        None => crate::config::resolve_default_config_path(),
    };

    let loaded = crate::config::load(&config_path);

    let mut daemon = Daemon::new(loaded.settings, config_path);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut daemon_task = tokio::spawn({
        let shutdown_tx = shutdown_tx.clone();
        async move { daemon.run(shutdown_rx, shutdown_tx).await }
    });

    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        res = &mut daemon_task => {
            match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(join_err) => Err(Box::new(join_err) as AnyError),
            }?;
            Ok(())
        }

        signal_name = async {
            tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        } => {
            crate::minfo!("daemon", "received {signal_name}, shutting down");
            let _ = shutdown_tx.send(true);

            match daemon_task.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(join_err) => Err(Box::new(join_err)),
            }
        }
    }
}
