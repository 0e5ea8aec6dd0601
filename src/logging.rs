//! Tracing subscriber setup shared by the binaries

use crate::config::LoggingConfig;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise the crate logs at `config.level`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn").add_directive(default_directive(config).parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    match config.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

fn default_directive(config: &LoggingConfig) -> String {
    format!("qual_scoring={}", config.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let config = LoggingConfig::default();
        assert_eq!(default_directive(&config), "qual_scoring=info");
        assert!(default_directive(&config)
            .parse::<tracing_subscriber::filter::Directive>()
            .is_ok());
    }
}
