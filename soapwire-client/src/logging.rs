use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs a console subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (e.g. `"soapwire=debug,warn"`)
/// applies when it is unset. Request and response envelopes are logged at
/// `trace`.
pub fn init_logging(default_filter: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))?;

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    tracing::debug!(filter = default_filter, "Logging initialized");
    Ok(())
}

/// Initialize simple console-only logging for tests
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soapwire=trace,debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_idempotent() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("still fine");
    }
}
