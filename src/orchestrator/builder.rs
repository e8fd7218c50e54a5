//! Builder for wiring orchestrator instances

use std::sync::Arc;

use super::{DEFAULT_STREAM_BUFFER, Orchestrator, Shared};
use crate::error::StoreRole;
use crate::processor::Processor;
use crate::resolver::Resolver;
use crate::store::{RoleStore, Store};
use crate::{CachineError, Result};

/// Main entry point for creating orchestrators.
pub struct Cachine;

impl Cachine {
    /// Create a new builder for properties of type `P`.
    pub fn builder<P>() -> CachineBuilder<P> {
        CachineBuilder::new()
    }
}

/// Builder for configuring orchestrators.
///
/// Origin, cache, resolver and processor are all required.
pub struct CachineBuilder<P> {
    origin: Option<Arc<dyn Store>>,
    cache: Option<Arc<dyn Store>>,
    resolver: Option<Arc<dyn Resolver<P>>>,
    processor: Option<Arc<dyn Processor<P>>>,
    stream_buffer: usize,
}

impl<P> CachineBuilder<P> {
    pub fn new() -> Self {
        Self {
            origin: None,
            cache: None,
            resolver: None,
            processor: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    /// Store holding the original resources.
    pub fn origin(self, store: impl Store + 'static) -> Self {
        self.origin_shared(Arc::new(store))
    }

    /// Origin store shared with other owners.
    pub fn origin_shared(mut self, store: Arc<dyn Store>) -> Self {
        self.origin = Some(store);
        self
    }

    /// Store holding derived variants.
    pub fn cache(self, store: impl Store + 'static) -> Self {
        self.cache_shared(Arc::new(store))
    }

    /// Cache store shared with other owners.
    pub fn cache_shared(mut self, store: Arc<dyn Store>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn resolver(mut self, resolver: impl Resolver<P> + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn processor(mut self, processor: impl Processor<P> + 'static) -> Self {
        self.processor = Some(Arc::new(processor));
        self
    }

    /// Number of events buffered ahead of a slow consumer (default 64).
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size;
        self
    }
}

impl<P: Send + Sync + 'static> CachineBuilder<P> {
    /// Build the orchestrator.
    pub fn build(self) -> Result<Orchestrator<P>> {
        let origin = self.origin.ok_or_else(|| missing("origin store"))?;
        let cache = self.cache.ok_or_else(|| missing("cache store"))?;
        let resolver = self.resolver.ok_or_else(|| missing("resolver"))?;
        let processor = self.processor.ok_or_else(|| missing("processor"))?;
        if self.stream_buffer == 0 {
            return Err(CachineError::Configuration(
                "stream buffer must hold at least one event".into(),
            ));
        }

        Ok(Orchestrator::new(Shared {
            origin: RoleStore::new(StoreRole::Origin, origin),
            cache: RoleStore::new(StoreRole::Cache, cache),
            resolver,
            processor,
            stream_buffer: self.stream_buffer,
        }))
    }
}

impl<P> Default for CachineBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> CachineError {
    CachineError::Configuration(format!("no {what} configured"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::IdentityProcessor;
    use crate::resolver::VariantPathResolver;
    use crate::store::MemoryStore;
    use crate::types::ImageProperties;

    fn complete() -> CachineBuilder<ImageProperties> {
        Cachine::builder()
            .origin(MemoryStore::new().named("origin"))
            .cache(MemoryStore::new().named("cache"))
            .resolver(VariantPathResolver)
            .processor(IdentityProcessor)
    }

    #[test]
    fn builds_with_all_collaborators() {
        let orchestrator = complete().build().unwrap();
        assert_eq!(orchestrator.origin().name(), "origin");
        assert_eq!(orchestrator.cache().role(), StoreRole::Cache);
        assert_eq!(orchestrator.processor_name(), "identity");
    }

    #[test]
    fn missing_store_is_a_configuration_error() {
        let err = Cachine::builder::<ImageProperties>()
            .cache(MemoryStore::new())
            .resolver(VariantPathResolver)
            .processor(IdentityProcessor)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, CachineError::Configuration(_)));
        assert!(err.to_string().contains("origin"));
    }

    #[test]
    fn missing_processor_is_a_configuration_error() {
        let err = Cachine::builder::<ImageProperties>()
            .origin(MemoryStore::new())
            .cache(MemoryStore::new())
            .resolver(VariantPathResolver)
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("processor"));
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = complete().stream_buffer(0).build().err().unwrap();
        assert!(matches!(err, CachineError::Configuration(_)));
    }
}
