use std::sync::Arc;

use arc_swap::ArcSwap;

use super::normalizer::{IndexNormalizer, RequestPath};
use super::outcome::RewriteOutcome;
use super::sink::DiagnosticSink;
use crate::metrics;

/// Shared, hot-swappable handle to the current [`IndexNormalizer`].
#[derive(Clone)]
pub struct RewriteEngine {
    normalizer: Arc<ArcSwap<IndexNormalizer>>,
}

impl RewriteEngine {
    pub fn new(initial: IndexNormalizer) -> Self {
        Self {
            normalizer: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn swap_normalizer(&self, new_normalizer: IndexNormalizer) {
        self.normalizer.store(Arc::new(new_normalizer));
    }

    pub fn snapshot(&self) -> Arc<IndexNormalizer> {
        self.normalizer.load_full()
    }

    pub fn rewrite_request<R>(&self, req: &mut R, sink: &dyn DiagnosticSink) -> RewriteOutcome
    where
        R: RequestPath + ?Sized,
    {
        let outcome = self.normalizer.load().rewrite_request(req, sink);
        metrics::counters::inc_rewrite(outcome.kind_str());
        outcome
    }
}
