//! Tracing / logging initialisation.

use std::collections::HashMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level per component.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Override per component: crate name → level
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            components: HashMap::new(),
            json: false,
        }
    }
}

/// Parse a `crate=level` override.
pub fn parse_component(s: &str) -> Result<(String, String), String> {
    let (component, level) = s
        .split_once('=')
        .ok_or_else(|| format!("expected CRATE=LEVEL, got '{s}'"))?;
    if component.is_empty() || level.is_empty() {
        return Err(format!("expected CRATE=LEVEL, got '{s}'"));
    }
    Ok((component.to_string(), level.to_string()))
}

impl LogConfig {
    /// Filter directives, e.g. `"info,poolscan_rpc=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Initialise tracing once at startup. Logs go to stderr so stdout carries
/// only events.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
