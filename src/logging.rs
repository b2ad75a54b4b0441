//! Tracing subscriber setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{Error, Result};

/// Default filter directive for a verbosity level
///
/// `RUST_LOG`, when set, takes precedence over this.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "trainctl=warn,warn",
        1 => "trainctl=info,warn",
        _ => "trainctl=debug,info",
    }
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed.
pub fn init_logging(verbosity: u8, json_output: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let result = if json_output {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_filter(env_filter);

        tracing_subscriber::registry().with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(false).with_filter(env_filter);

        tracing_subscriber::registry().with(fmt_layer).try_init()
    };

    result.map_err(|e| Error::internal(format!("failed to initialize logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, "trainctl=warn,warn")]
    #[test_case(1, "trainctl=info,warn")]
    #[test_case(2, "trainctl=debug,info")]
    fn test_verbosity_directive(verbosity: u8, expected: &str) {
        assert_eq!(default_directive(verbosity), expected);
    }

    #[test]
    fn test_second_init_fails() {
        let _ = init_logging(1, false);
        assert!(init_logging(1, false).is_err());
    }
}
