//! Function registry
//!
//! Maps stable names to trampolines. An encoded call names its function by
//! `TargetId` (a hash of the registered name), never by code address, so a
//! buffer can only be replayed against functions that were registered under
//! the same name and signature.

use super::trampoline::{BoundCall, Trampoline};
use crate::codec::Codec;
use crate::core::{ArgList, Callable, Fingerprint, TargetId};
use crate::errors::{CallError, RegistryError};
use crate::infrastructure::CallStats;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

static GLOBAL: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// Typed reference to a registered function
///
/// Carries the signature at compile time, so `prepare` only accepts argument
/// tuples the function can take.
pub struct FnHandle<Args, R> {
    target: TargetId,
    name: Arc<str>,
    _signature: PhantomData<fn(Args) -> R>,
}

impl<Args, R> FnHandle<Args, R> {
    fn new(target: TargetId, name: Arc<str>) -> Self {
        Self {
            target,
            name,
            _signature: PhantomData,
        }
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<Args, R> Clone for FnHandle<Args, R> {
    fn clone(&self) -> Self {
        Self::new(self.target, self.name.clone())
    }
}

impl<Args, R> fmt::Debug for FnHandle<Args, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandle")
            .field("name", &self.name)
            .field("target", &self.target)
            .finish()
    }
}

struct Registered {
    name: Arc<str>,
    signature: Fingerprint,
    trampoline: Trampoline,
}

pub struct FunctionRegistry {
    entries: DashMap<TargetId, Registered>,
    codec: Codec,
    stats: Arc<CallStats>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::with_codec(Codec::default())
    }

    pub fn with_codec(codec: Codec) -> Self {
        Self {
            entries: DashMap::new(),
            codec,
            stats: Arc::new(CallStats::new()),
        }
    }

    /// Process-wide registry, populated at startup
    pub fn global() -> &'static FunctionRegistry {
        &GLOBAL
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn stats(&self) -> &Arc<CallStats> {
        &self.stats
    }

    /// Register `func` under `name`
    ///
    /// Registering the same name again with the same signature replaces the
    /// function. A different signature, or a different name that hashes to the
    /// same id, is a `Conflict`.
    pub fn register<F, Args, R>(&self, name: &str, func: F) -> Result<FnHandle<Args, R>, RegistryError>
    where
        F: Callable<Args, Output = R>,
        Args: ArgList,
        R: Serialize + 'static,
    {
        let target = TargetId::from_name(name);
        let signature = Fingerprint::of_signature::<Args, R>();
        let name: Arc<str> = Arc::from(name);

        let call = BoundCall::<F, Args, R>::new(target, func, self.codec, self.stats.clone());
        let registered = Registered {
            name: name.clone(),
            signature,
            trampoline: Trampoline::new(Arc::new(call), self.codec),
        };

        match self.entries.entry(target) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if existing.name != name || existing.signature != signature {
                    return Err(RegistryError::Conflict {
                        name: name.to_string(),
                        existing: existing.name.to_string(),
                    });
                }
                occupied.insert(registered);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(registered);
            }
        }

        debug!(name = %name, target_id = %target, arity = Args::ARITY, "Registered function");
        Ok(FnHandle::new(target, name))
    }

    /// Recover a typed handle for a function registered elsewhere
    pub fn handle<Args, R>(&self, name: &str) -> Result<FnHandle<Args, R>, RegistryError>
    where
        Args: ArgList,
        R: 'static,
    {
        let target = TargetId::from_name(name);
        let entry = self
            .entries
            .get(&target)
            .filter(|entry| &*entry.name == name)
            .ok_or_else(|| RegistryError::NotFound { name: name.to_string() })?;

        if entry.signature != Fingerprint::of_signature::<Args, R>() {
            return Err(RegistryError::SignatureMismatch { name: name.to_string() });
        }

        Ok(FnHandle::new(target, entry.name.clone()))
    }

    /// Trampoline for a target id, as read from a buffer header
    pub fn trampoline(&self, target: TargetId) -> Result<Trampoline, CallError> {
        self.entries
            .get(&target)
            .map(|entry| entry.trampoline.clone())
            .ok_or(CallError::UnknownTarget(target))
    }

    pub fn name_of(&self, target: TargetId) -> Option<String> {
        self.entries.get(&target).map(|entry| entry.name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.name_of(TargetId::from_name(name)).as_deref() == Some(name)
    }

    /// Remove `name`; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        self.entries
            .remove_if(&TargetId::from_name(name), |_, entry| &*entry.name == name)
            .is_some()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|entry| entry.name.to_string()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
