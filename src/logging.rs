//! Tracing setup and log hygiene helpers

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},tower_http=info,hyper=warn,reqwest=warn",
            config.level.to_lowercase()
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init(),
    };

    if let Err(e) = result {
        eprintln!("tracing subscriber already initialised: {}", e);
    }
}

/// Keeps the first and last four characters of a secret. Values of eight
/// characters or fewer are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.is_empty() {
        return "<empty>".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
