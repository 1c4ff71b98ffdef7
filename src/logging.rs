//! Tracing for the CLI and server. Detections are logged at `info` under the
//! `webdetector` target; `RUST_LOG` overrides the default filter.

use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_JSON: &str = "WEBDETECTOR_LOG_JSON";

/// Quiet dependencies, keep our own match and scan lines.
pub const DEFAULT_FILTER: &str = "warn,webdetector=info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// `WEBDETECTOR_LOG_JSON=1` selects JSON lines for log shippers.
    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_LOG_JSON).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("1") | Some("true") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber on stderr so stdout stays pure JSON output.
/// A second call is a no-op.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let _ = match LogFormat::from_env() {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selection() {
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("0")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(Some("1")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" true ")), LogFormat::Json);
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging();
        init_logging();
        tracing::info!(target: "webdetector", "logging ready");
    }
}
