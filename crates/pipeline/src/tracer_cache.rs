use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use autotrace_core::model::tracer::TracerIdentity;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::debug;

pub type SdkTracer = <SdkTracerProvider as TracerProvider>::Tracer;

/// Lazily created tracers, one per distinct identity. Lookup and insert
/// happen under a single lock so concurrent first uses of an identity agree
/// on one handle.
pub struct TracerCache {
    provider: SdkTracerProvider,
    tracers: Mutex<HashMap<TracerIdentity, Arc<SdkTracer>>>,
}

impl TracerCache {
    pub fn new(provider: SdkTracerProvider) -> Self {
        Self {
            provider,
            tracers: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, identity: &TracerIdentity) -> Arc<SdkTracer> {
        // A panic while holding the lock cannot leave the map half-updated.
        let mut tracers = self.tracers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tracer) = tracers.get(identity) {
            return Arc::clone(tracer);
        }

        debug!(scope = %identity.name, "creating tracer");
        let tracer = Arc::new(self.provider.tracer_with_scope(identity.to_scope()));
        tracers.insert(identity.clone(), Arc::clone(&tracer));
        tracer
    }

    pub fn len(&self) -> usize {
        self.tracers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn identity(name: &str) -> TracerIdentity {
        TracerIdentity::new(name).with_version("0.1.0")
    }

    #[test]
    fn same_identity_same_handle() {
        let cache = TracerCache::new(SdkTracerProvider::builder().build());
        let first = cache.get(&identity("autotrace/net/http"));
        let second = cache.get(&identity("autotrace/net/http"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn version_and_schema_are_part_of_identity() {
        let cache = TracerCache::new(SdkTracerProvider::builder().build());
        let a = cache.get(&identity("autotrace/net/http"));
        let b = cache.get(&identity("autotrace/net/http").with_version("0.2.0"));
        let c = cache.get(&identity("autotrace/net/http").with_schema_url("https://example.com/s"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn concurrent_first_use_creates_one_tracer() {
        let cache = Arc::new(TracerCache::new(SdkTracerProvider::builder().build()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get(&identity("autotrace/database/sql")))
            })
            .collect();

        let tracers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(tracers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.len(), 1);
    }
}
