//! Stdout event sink.

use std::io::Write;

use async_trait::async_trait;
use clap::ValueEnum;

use poolscan_core::error::ScanError;
use poolscan_core::sink::EventSink;
use poolscan_core::types::PoolCreatedEvent;

/// How events are rendered on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// The multi-line "New pool created" block.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Prints each event to stdout as soon as it is emitted.
pub struct StdoutSink {
    format: OutputFormat,
}

impl StdoutSink {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, event: &PoolCreatedEvent) -> Result<String, ScanError> {
        match self.format {
            OutputFormat::Text => Ok(format!("{event}\n")),
            OutputFormat::Json => serde_json::to_string(event)
                .map(|line| line + "\n")
                .map_err(|e| ScanError::Sink(e.to_string())),
        }
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn emit(&self, event: &PoolCreatedEvent) -> Result<(), ScanError> {
        let rendered = self.render(event)?;
        let mut out = std::io::stdout().lock();
        out.write_all(rendered.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| ScanError::Sink(e.to_string()))
    }
}
