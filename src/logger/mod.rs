// SPDX-License-Identifier: GPL-3.0-only

use anyhow::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init_logger() -> Result<()> {
    let level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,cosmic_frame_sync={}", level)));
    let fmt_layer = fmt::layer().compact();

    let journald = tracing_journald::layer();
    let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);
    match journald {
        Ok(journald) => registry.with(journald).try_init()?,
        Err(ref err) => {
            registry.try_init()?;
            warn!(
                ?err,
                "Failed to connect to journald, logging to stderr only"
            );
        }
    }
    log_panics::init();

    info!("Version: {}", std::env!("CARGO_PKG_VERSION"));
    if cfg!(debug_assertions) {
        debug!(
            "Debug build ({})",
            std::option_env!("GIT_HASH").unwrap_or("Unknown")
        );
    }

    Ok(())
}
