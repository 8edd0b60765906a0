//! Provider-side logging.
//!
//! Stdout belongs to the protocol, so everything goes to stderr, where the
//! host collects it alongside the provider's other diagnostics.

use std::io::IsTerminal as _;

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{format::FmtSpan, Layer as FmtLayer},
    layer::SubscriberExt as _,
    Layer as _, Registry,
};

/// Environment variable that selects the provider's log level.
pub const LOG_ENV_VAR: &str = "STATEFULSTRING_LOG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub level: Level,
    pub verbose: bool,
    pub color: bool,
}

impl Options {
    /// Read the options from [`LOG_ENV_VAR`] and the terminal state of stderr.
    pub fn from_env() -> Result<Options> {
        let value = std::env::var(LOG_ENV_VAR).ok();
        let mut options = Self::parse(value.as_deref())?;
        options.color = std::io::stderr().is_terminal();
        Ok(options)
    }

    fn parse(value: Option<&str>) -> Result<Options> {
        let level = match value.map(str::trim) {
            None | Some("") => Level::INFO,
            Some(s) => s
                .parse::<Level>()
                .with_context(|| format!("Invalid value for {}: {:?}", LOG_ENV_VAR, s))?,
        };
        Ok(Options {
            level,
            verbose: level == Level::TRACE,
            color: false,
        })
    }
}

pub fn set_up(options: &Options) -> Result<()> {
    let span_events = if options.verbose {
        // include enter/exit events for detailed tracing
        FmtSpan::FULL
    } else {
        // announce what we do and when we're done
        FmtSpan::NEW | FmtSpan::CLOSE
    };

    let fmt_layer = FmtLayer::new()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_ansi(options.color)
        .with_filter(LevelFilter::from_level(options.level));
    let subscriber = Registry::default().with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("failed to set up tracing: {}", e))?;

    Ok(())
}
