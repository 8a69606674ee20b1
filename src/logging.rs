//! Tracing subscriber setup for the CLI and server.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingSection;

/// Pick the filter directive: `RUST_LOG` wins, then `--verbose`, then
/// the configured filter, then `info`.
pub fn filter_directive(config: &LoggingSection, verbose: bool, rust_log: Option<&str>) -> String {
    if let Some(directive) = rust_log.filter(|d| !d.trim().is_empty()) {
        return directive.to_string();
    }
    if verbose {
        return "debug".to_string();
    }
    config
        .filter
        .clone()
        .unwrap_or_else(|| "info,tower_http=info".to_string())
}

/// Install the global subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init(config: &LoggingSection, verbose: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(config, verbose, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_log_wins() {
        let config = LoggingSection {
            json: false,
            filter: Some("warn".to_string()),
        };
        assert_eq!(filter_directive(&config, true, Some("trace")), "trace");
    }

    #[test]
    fn test_verbose_over_config() {
        let config = LoggingSection {
            json: false,
            filter: Some("warn".to_string()),
        };
        assert_eq!(filter_directive(&config, true, None), "debug");
        assert_eq!(filter_directive(&config, false, Some("  ")), "warn");
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(
            filter_directive(&LoggingSection::default(), false, None),
            "info,tower_http=info"
        );
    }
}
