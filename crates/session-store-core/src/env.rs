// Environment detection and tracing setup.

use std::sync::OnceLock;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

impl EnvMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => EnvMode::Production,
            "test" | "testing" => EnvMode::Test,
            _ => EnvMode::Development,
        }
    }
}

/// Detect the current environment mode from environment variables.
/// Checks `SESSION_STORE_ENV`, then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("SESSION_STORE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        EnvMode::parse(&env_val)
    })
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_filter() -> &'static str {
    if is_production() {
        "session_store=info"
    } else {
        "session_store=debug"
    }
}

/// Initialize the `tracing` subscriber with appropriate defaults.
/// In production, uses JSON format. Elsewhere, the human-readable format.
///
/// Safe to call more than once; later calls leave the installed subscriber in
/// place.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false);

    let result = if is_production() {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!(EnvMode::parse("PROD"), EnvMode::Production);
        assert_eq!(EnvMode::parse("production"), EnvMode::Production);
        assert_eq!(EnvMode::parse("testing"), EnvMode::Test);
        assert_eq!(EnvMode::parse(""), EnvMode::Development);
        assert_eq!(EnvMode::parse("staging"), EnvMode::Development);
    }

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
    }
}
