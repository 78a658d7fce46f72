use std::sync::Mutex;

/// Where the normalizer writes its `Old URI` / `New URI` lines.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, line: &str);
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, line: &str) {
        tracing::info!(target: "edge_index::rewrite", "{}", line);
    }
}

/// Keeps lines in memory, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut g) => g.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}
