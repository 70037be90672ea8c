use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use bridge_cni::commands::run_cni;
use bridge_cni::types::CNI_VERSION;

/// Append-only destination for executed-command and diagnostic lines
const LOG_FILE: &str = "/var/log/bridge-cni.log";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout is reserved for the result document, so fall back to stderr when
    // the log file cannot be opened.
    match OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        Ok(file) => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
        Err(_) => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            let _ = tracing::subscriber::set_global_default(subscriber);
        }
    }
}

fn main() -> Result<()> {
    init_logging();

    if let Err(err) = run_cni() {
        error!("CNI plugin error: {}", err);

        // Output error in CNI format
        let doc = serde_json::json!({
            "cniVersion": CNI_VERSION,
            "code": err.code(),
            "msg": err.to_string(),
            "details": "",
        });
        println!("{}", doc);
        std::process::exit(1);
    }

    Ok(())
}
