use time::macros::format_description;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    fmt::{self, time::OffsetTime},
    prelude::*,
    EnvFilter,
};

/// Diagnostics go to stderr; stdout carries only the measurement lines.
pub fn init() {
    // see https://time-rs.github.io/book/api/format-description.html
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[hour]:[minute]:[second]:[subsecond digits:3]"),
    );

    let layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_timer(timer);

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry().with(layer).with(filter).init();
}
