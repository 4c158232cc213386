use std::sync::Arc;

use crate::config::Config;
use crate::controller::inspector::ConformityInspector;
use crate::controller::patcher::OptimisticPatcher;
use crate::controller::store::ScaledObjectStore;
use crate::health::Metrics;

/// Shared context for a sweep
#[derive(Clone)]
pub struct Context {
    /// Where ScaledObjects are listed, fetched and updated
    pub store: Arc<dyn ScaledObjectStore>,
    /// Conformity inspector wired to a patcher over `store`
    pub inspector: ConformityInspector,
    /// Metrics, when a health server is running
    pub metrics: Option<Arc<Metrics>>,
    /// Namespaces reconciled concurrently
    pub concurrency: usize,
}

impl Context {
    pub fn new(store: Arc<dyn ScaledObjectStore>, config: &Config) -> Self {
        let patcher = OptimisticPatcher::new(store.clone(), config.retry.clone());
        let inspector = ConformityInspector::new(patcher, config.encoding, config.prefix.clone());
        Self {
            store,
            inspector,
            metrics: None,
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn with_metrics(store: Arc<dyn ScaledObjectStore>, config: &Config, metrics: Arc<Metrics>) -> Self {
        let patcher = OptimisticPatcher::new(store.clone(), config.retry.clone())
            .with_metrics(metrics.clone());
        let inspector = ConformityInspector::new(patcher, config.encoding, config.prefix.clone())
            .with_metrics(metrics.clone());
        Self {
            store,
            inspector,
            metrics: Some(metrics),
            concurrency: config.concurrency.max(1),
        }
    }
}
