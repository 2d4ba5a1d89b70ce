//! Metric export sinks.
//!
//! An exporter receives every recorded [`RequestMetrics`] and forwards it to
//! an external system (a metrics pipeline, a log shipper). Exporters run
//! outside the collector's lock and their errors are swallowed by the
//! collector, so a slow or failing sink can never destabilize the request
//! path.

use super::metrics::RequestMetrics;
use crate::Result;
use std::sync::{Arc, RwLock};

/// Destination for recorded request metrics.
pub trait MetricsExporter: Send + Sync {
    fn export(&self, metrics: &RequestMetrics) -> Result<()>;
}

/// Default sink: discards everything.
pub struct NoopExporter;

impl MetricsExporter for NoopExporter {
    fn export(&self, _metrics: &RequestMetrics) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink for testing.
pub struct InMemoryExporter {
    records: Arc<RwLock<Vec<RequestMetrics>>>,
    max_records: usize,
}

impl InMemoryExporter {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
            max_records,
        }
    }

    pub fn get_records(&self) -> Vec<RequestMetrics> {
        self.records.read().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsExporter for InMemoryExporter {
    fn export(&self, metrics: &RequestMetrics) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.push(metrics.clone());
        if records.len() > self.max_records {
            records.remove(0);
        }
        Ok(())
    }
}

/// Composite sink for multiple destinations. One failing destination does not
/// stop delivery to the others.
#[derive(Default)]
pub struct CompositeExporter {
    exporters: Vec<Arc<dyn MetricsExporter>>,
}

impl CompositeExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_exporter(mut self, exporter: Arc<dyn MetricsExporter>) -> Self {
        self.exporters.push(exporter);
        self
    }
}

impl MetricsExporter for CompositeExporter {
    fn export(&self, metrics: &RequestMetrics) -> Result<()> {
        for exporter in &self.exporters {
            if let Err(error) = exporter.export(metrics) {
                tracing::debug!(%error, "composite exporter destination failed");
            }
        }
        Ok(())
    }
}
