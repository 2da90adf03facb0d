//! Executor - run stored calls by key
//!
//! The executor needs no type information: the buffer header names the target,
//! and the registry supplies the trampoline that knows the signature.

use super::registry::FunctionRegistry;
use crate::codec::Header;
use crate::errors::{CallError, StoreError};
use crate::store::{Store, StoreKey};
use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct Executor {
    registry: Arc<FunctionRegistry>,
    store: Arc<dyn Store>,
}

impl Executor {
    pub fn new(registry: Arc<FunctionRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    /// Route a raw buffer to its registered trampoline and run it
    pub fn invoke_buffer(&self, buffer: &[u8]) -> Result<Vec<u8>, CallError> {
        let header: Header = self.registry.codec().peek_header(buffer).map_err(|err| {
            self.registry.stats().record_decode_failure();
            err
        })?;

        let trampoline = self.registry.trampoline(header.target)?;
        trampoline.call(buffer)
    }

    /// Run the call stored under `key`, leaving it in the store
    pub fn invoke(&self, key: &StoreKey) -> Result<Vec<u8>, CallError> {
        let buffer = self.track(self.store.read(key))?;
        debug!(key = %key, "Replaying stored call");
        self.invoke_buffer(&buffer)
    }

    /// Remove the call stored under `key` and run it
    ///
    /// With a store whose `take` is atomic, concurrent consumers of one key
    /// run the call exactly once between them.
    pub fn consume(&self, key: &StoreKey) -> Result<Vec<u8>, CallError> {
        let buffer = self.track(self.store.take(key))?;
        debug!(key = %key, "Consuming stored call");
        self.invoke_buffer(&buffer)
    }

    /// `invoke` every key in parallel; results keep the order of `keys`
    pub fn invoke_all(&self, keys: &[StoreKey]) -> Vec<Result<Vec<u8>, CallError>> {
        keys.par_iter().map(|key| self.invoke(key)).collect()
    }

    /// `consume` every key in parallel; results keep the order of `keys`
    pub fn consume_all(&self, keys: &[StoreKey]) -> Vec<Result<Vec<u8>, CallError>> {
        keys.par_iter().map(|key| self.consume(key)).collect()
    }

    fn track(&self, result: Result<Vec<u8>, StoreError>) -> Result<Vec<u8>, CallError> {
        result.map_err(|err| {
            warn!(error = %err, "Store read failed");
            self.registry.stats().record_store_error();
            CallError::Store(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::Preparer;
    use crate::store::MemoryStore;

    fn square(x: u64) -> u64 {
        x * x
    }

    fn setup() -> (Preparer, Executor) {
        let preparer = Preparer::new(Arc::new(FunctionRegistry::new()), Arc::new(MemoryStore::new()));
        let executor = preparer.executor();
        (preparer, executor)
    }

    #[test]
    fn test_invoke_routes_by_header() {
        let (preparer, executor) = setup();
        let square_fn = preparer.registry().register("square", square).unwrap();
        let shout_fn = preparer.registry().register("shout", |s: String| s.to_uppercase()).unwrap();

        let a = preparer.prepare_unique(&square_fn, (12,)).unwrap();
        let b = preparer.prepare_unique(&shout_fn, ("hi".to_string(),)).unwrap();

        let codec = preparer.registry().codec();
        let squared: u64 = codec.decode_output(&executor.invoke(a.key()).unwrap()).unwrap();
        let shouted: String = codec.decode_output(&executor.invoke(b.key()).unwrap()).unwrap();
        assert_eq!(squared, 144);
        assert_eq!(shouted, "HI");
    }

    #[test]
    fn test_consume_removes() {
        let (preparer, executor) = setup();
        let handle = preparer.registry().register("square", square).unwrap();
        let prepared = preparer.prepare_unique(&handle, (3,)).unwrap();

        executor.consume(prepared.key()).unwrap();
        assert!(!preparer.store().contains(prepared.key()));
        assert!(matches!(executor.consume(prepared.key()), Err(CallError::Store(StoreError::NotFound(_)))));
    }

    #[test]
    fn test_invoke_all_keeps_order() {
        let (preparer, executor) = setup();
        let handle = preparer.registry().register("square", square).unwrap();
        let keys: Vec<StoreKey> = (0..32u64)
            .map(|i| preparer.prepare_unique(&handle, (i,)).unwrap().key().clone())
            .collect();

        let codec = preparer.registry().codec();
        let results: Vec<u64> = executor
            .invoke_all(&keys)
            .into_iter()
            .map(|r| codec.decode_output(&r.unwrap()).unwrap())
            .collect();
        let expected: Vec<u64> = (0..32u64).map(|i| i * i).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_garbage_and_unknown_targets() {
        let (preparer, executor) = setup();
        assert!(matches!(executor.invoke_buffer(b"nope"), Err(CallError::Decode(_))));

        let handle = preparer.registry().register("square", square).unwrap();
        let prepared = preparer.prepare_unique(&handle, (3,)).unwrap();
        preparer.registry().unregister("square");
        assert!(matches!(executor.invoke(prepared.key()), Err(CallError::UnknownTarget(_))));
    }
}
