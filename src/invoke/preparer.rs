//! Preparer - capture a call and hand it to a store

use super::executor::Executor;
use super::registry::{FnHandle, FunctionRegistry};
use super::trampoline::Trampoline;
use crate::core::{ArgList, CallEnvelope};
use crate::errors::CallError;
use crate::store::{Store, StoreKey};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// A call that has been encoded and stored, waiting to run
///
/// `R` is the return type of the prepared function, taken from its handle.
pub struct Prepared<R> {
    key: StoreKey,
    trampoline: Trampoline,
    _output: PhantomData<fn() -> R>,
}

impl<R> Prepared<R> {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Untyped trampoline, the same shape for every signature
    pub fn trampoline(&self) -> &Trampoline {
        &self.trampoline
    }

    pub fn into_parts(self) -> (StoreKey, Trampoline) {
        (self.key, self.trampoline)
    }

    /// Run the call in `buffer` and decode its result as `R`
    pub fn call(&self, buffer: &[u8]) -> Result<R, CallError>
    where
        R: DeserializeOwned,
    {
        self.trampoline.call_returning(buffer)
    }
}

impl<R> Clone for Prepared<R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            trampoline: self.trampoline.clone(),
            _output: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Prepared<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prepared")
            .field("key", &self.key)
            .field("trampoline", &self.trampoline)
            .finish()
    }
}

pub struct Preparer {
    registry: Arc<FunctionRegistry>,
    store: Arc<dyn Store>,
}

impl Preparer {
    pub fn new(registry: Arc<FunctionRegistry>, store: Arc<dyn Store>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Arc<FunctionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Encode `handle(args...)` and write it under `key`
    ///
    /// Overlapping calls must not share a key; the later write replaces the
    /// earlier one. Use `prepare_unique` unless the key is agreed out of band.
    pub fn prepare<Args, R>(&self, handle: &FnHandle<Args, R>, key: StoreKey, args: Args) -> Result<Prepared<R>, CallError>
    where
        Args: ArgList,
    {
        let trampoline = self.registry.trampoline(handle.target())?;
        let bytes = self
            .registry
            .codec()
            .encode(&CallEnvelope::new(handle.target(), args))?;

        if let Err(err) = self.store.write(&key, &bytes) {
            self.registry.stats().record_store_error();
            return Err(err.into());
        }
        self.registry.stats().record_prepared();

        debug!(function = handle.name(), key = %key, bytes = bytes.len(), "Prepared deferred call");
        Ok(Prepared {
            key,
            trampoline,
            _output: PhantomData,
        })
    }

    /// `prepare` under a freshly allocated key
    pub fn prepare_unique<Args, R>(&self, handle: &FnHandle<Args, R>, args: Args) -> Result<Prepared<R>, CallError>
    where
        Args: ArgList,
    {
        self.prepare(handle, StoreKey::unique(), args)
    }

    /// Read the stored buffer back and run its trampoline
    ///
    /// The buffer stays in the store; calling this twice runs the call twice.
    pub fn invoke<R>(&self, prepared: &Prepared<R>) -> Result<Vec<u8>, CallError> {
        let bytes = self.read(prepared.key())?;
        prepared.trampoline().call(&bytes)
    }

    /// `invoke`, decoding the result as the prepared function's return type
    pub fn invoke_returning<R: DeserializeOwned>(&self, prepared: &Prepared<R>) -> Result<R, CallError> {
        let bytes = self.read(prepared.key())?;
        prepared.call(&bytes)
    }

    fn read(&self, key: &StoreKey) -> Result<Vec<u8>, CallError> {
        self.store.read(key).map_err(|err| {
            self.registry.stats().record_store_error();
            err.into()
        })
    }

    /// Executor sharing this preparer's registry and store
    pub fn executor(&self) -> Executor {
        Executor::new(self.registry.clone(), self.store.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn render(x: i32, y: i32) -> String {
        format!("x = {}, y = {}", x, y)
    }

    fn setup() -> (Preparer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let preparer = Preparer::new(Arc::new(FunctionRegistry::new()), store.clone());
        (preparer, store)
    }

    #[test]
    fn test_prepare_then_invoke() {
        let (preparer, store) = setup();
        let handle = preparer.registry().register("render", render).unwrap();

        let prepared = preparer.prepare(&handle, StoreKey::new("filename").unwrap(), (1, 2)).unwrap();
        assert!(store.contains(prepared.key()));

        let bytes = store.read(prepared.key()).unwrap();
        let text: String = prepared.trampoline().call_returning(&bytes).unwrap();
        assert_eq!(text, "x = 1, y = 2");
        assert_eq!(preparer.registry().stats().snapshot().prepared, 1);
    }

    #[test]
    fn test_invoke_twice_runs_twice() {
        let (preparer, _) = setup();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let handle = preparer
            .registry()
            .register("bump", move |by: usize| {
                seen.fetch_add(by, Ordering::SeqCst);
            })
            .unwrap();

        let prepared = preparer.prepare_unique(&handle, (1,)).unwrap();
        preparer.invoke(&prepared).unwrap();
        preparer.invoke(&prepared).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(preparer.registry().stats().snapshot().invoked, 2);
    }

    #[test]
    fn test_result_type_comes_from_handle() {
        let (preparer, store) = setup();
        let handle = preparer.registry().register("render", render).unwrap();
        let prepared = preparer.prepare_unique(&handle, (3, 4)).unwrap();

        let bytes = store.read(prepared.key()).unwrap();
        assert_eq!(prepared.call(&bytes).unwrap(), "x = 3, y = 4");
        assert_eq!(preparer.invoke_returning(&prepared).unwrap(), "x = 3, y = 4");
    }

    #[test]
    fn test_unregistered_handle() {
        let (preparer, store) = setup();
        let handle = preparer.registry().register("render", render).unwrap();
        preparer.registry().unregister("render");

        let result = preparer.prepare_unique(&handle, (1, 2));
        assert!(matches!(result, Err(CallError::UnknownTarget(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_buffer() {
        let (preparer, store) = setup();
        let handle = preparer.registry().register("render", render).unwrap();
        let prepared = preparer.prepare_unique(&handle, (1, 2)).unwrap();
        store.clear();

        assert!(matches!(preparer.invoke(&prepared), Err(CallError::Store(_))));
        assert_eq!(preparer.registry().stats().snapshot().store_errors, 1);
    }
}
