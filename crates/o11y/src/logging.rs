use tracing_subscriber::EnvFilter;

/// Log output encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, for collectors.
    #[default]
    Json,
    /// Human-readable text with ANSI colors.
    Pretty,
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// A bare level like "debug", or a full directive string such as
    /// "info,shape_engine=trace". Bare levels apply to shapesink crates
    /// only; driver noise stays capped. `RUST_LOG` overrides either.
    pub level: Option<String>,
    pub format: LogFormat,
    /// Include the emitting module target on each line.
    pub with_targets: bool,
}

/// The SQL drivers and the HTTP stack log connection chatter at info;
/// a bare level in [`Config::level`] should not turn that on.
const DRIVER_DIRECTIVES: &str = "mysql_async=warn,hyper=warn,mio=warn";

pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(cfg.level.as_deref()))
        .with_target(cfg.with_targets);

    // A subscriber may already be installed (tests init per-case); the
    // first one wins and later calls are no-ops.
    let outcome = match cfg.format {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Pretty => builder.with_ansi(true).try_init(),
    };
    if let Err(e) = outcome {
        tracing::debug!(error = %e, "logging already initialized");
    }
    Ok(())
}

fn resolve_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(env) = std::env::var("RUST_LOG") {
        return EnvFilter::new(env);
    }
    match level {
        // A directive string is taken as-is; the caller owns the details.
        Some(directives) if directives.contains('=') => {
            EnvFilter::new(directives)
        }
        Some(level) => {
            EnvFilter::new(format!("{level},{DRIVER_DIRECTIVES}"))
        }
        None => EnvFilter::new(format!("info,{DRIVER_DIRECTIVES}")),
    }
}
