// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// `KHATA_LOG` wins over `[log].level`.
fn filter_directive(config: &Config, env_value: Option<String>) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.log_level().to_owned())
}

/// Sends `tracing` output to the log file; the terminal belongs to the UI.
///
/// Returns the file being written. Calling this twice keeps the first
/// subscriber.
pub fn init_logging(config: &Config) -> Result<PathBuf> {
    let directive = filter_directive(config, std::env::var("KHATA_LOG").ok());
    let filter = EnvFilter::try_new(&directive).with_context(|| {
        format!("invalid log filter {directive:?} -- fix [log].level or KHATA_LOG")
    })?;

    let path = config.log_file()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                path.display()
            )
        })?;

    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(Mutex::new(file));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
    Ok(path)
}
