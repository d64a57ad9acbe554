//! A trimmed-down version of a console logging setup built around
//! `tracing_subscriber_config_utils`: no broadcast-to-webui plumbing, just
//! `RUST_LOG`-driven `EnvFilter` over a `fmt` layer.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub fn init(console_level: Option<LogLevel>) -> anyhow::Result<()> {
    let default_directive = console_level.map(LogLevel::as_directive).unwrap_or("info");
    let filter = EnvFilter::builder()
        .with_default_directive(default_directive.parse().context("invalid default log directive")?)
        .from_env()
        .context("invalid RUST_LOG value")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
