pub mod logging;
pub mod panic;
pub mod sink_metrics;

#[derive(Clone, Debug, Default)]
pub struct O11yConfig {
    pub logging: logging::Config,
    pub metrics: sink_metrics::Config,
    pub install_panic_hook: bool,
}

/// Initialize logging, metrics, and the panic hook in one call.
pub fn init_all(cfg: &O11yConfig) -> Result<(), Box<dyn std::error::Error>> {
    logging::init(&cfg.logging)?;
    sink_metrics::init(&cfg.metrics)?;
    if cfg.install_panic_hook {
        panic::install_hook();
    }
    Ok(())
}
