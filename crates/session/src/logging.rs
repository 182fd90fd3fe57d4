//! Tracing bootstrap for host applications

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use voice_client_config::{LogFormat, ObservabilityConfig};

/// Install a global subscriber for the given observability settings
///
/// `RUST_LOG` wins over the configured level. Returns `false` if a global
/// subscriber was already installed.
pub fn init_tracing(config: &ObservabilityConfig) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        format!("voice_client={},warn", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    subscriber.with(fmt_layer).try_init().is_ok()
}
