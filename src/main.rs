//! `secure-datagramd`: sealed datagram relay.
//!
//! Startup sequence:
//! 1. Load [`RelayConfig`] from the file named on the command line (or in
//!    `SECURE_DATAGRAM_CONFIG`), else from defaults; apply environment overrides.
//! 2. Validate it and decode the key. Failures exit before any socket is bound.
//! 3. Initialise structured logging.
//! 4. Bind every listener and serve until Ctrl-C.

use std::process::ExitCode;

use secure_datagram::service::Relay;
use secure_datagram::utils::logging::init_logging;
use secure_datagram::{RelayConfig, Result};
use tracing::error;

const ENV_CONFIG: &str = "SECURE_DATAGRAM_CONFIG";

fn load_config() -> Result<RelayConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(ENV_CONFIG).ok());

    let mut config = match path {
        Some(path) => RelayConfig::from_file(path)?,
        None => RelayConfig::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let (config, relay) = match load_config().and_then(|c| Relay::from_config(&c).map(|r| (c, r))) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("ERROR: secure-datagramd configuration invalid: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("ERROR: {e}");
        return ExitCode::FAILURE;
    }

    let bound = match relay.bind().await {
        Ok(bound) => bound,
        Err(e) => {
            error!(error = %e, "Failed to bind listeners");
            return ExitCode::FAILURE;
        }
    };

    match bound.run_until_ctrl_c().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Relay stopped with an error");
            ExitCode::FAILURE
        }
    }
}
