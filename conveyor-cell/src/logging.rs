use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, EnvFilter};

/// RUST_LOG wins over the verbosity flag when set
pub fn setup_tracing(verbosity_level: u8) {
    let filter = match verbosity_level {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(filter.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .init();
}
