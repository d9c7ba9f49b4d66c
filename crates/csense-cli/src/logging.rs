//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter directive when `RUST_LOG` does not cover our crates.
pub const DEFAULT_DIRECTIVE: &str = "csense=info";

/// Output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("LOG_FORMAT").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init(verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose { "csense=debug" } else { DEFAULT_DIRECTIVE };
    let env_filter = EnvFilter::from_default_env()
        .add_directive(directive.parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .try_init()?,
        LogFormat::Text => tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .try_init()?,
    }

    Ok(())
}
