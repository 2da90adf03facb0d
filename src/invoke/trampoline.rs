//! Type-erased trampolines
//!
//! Every registered function gets one `BoundCall<F, Args, R>` that knows its
//! exact signature. It is stored behind `dyn InvokeFromBuffer`, so all
//! trampolines share one shape: bytes in, encoded return value out.

use crate::codec::Codec;
use crate::core::{ArgList, Callable, Fingerprint, TargetId};
use crate::errors::{CallError, DecodeError};
use crate::infrastructure::CallStats;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Decode a buffer, run the call, encode its result
pub trait InvokeFromBuffer: Send + Sync {
    fn target(&self) -> TargetId;

    /// Fingerprint of the argument tuple this trampoline decodes
    fn fingerprint(&self) -> Fingerprint;

    fn invoke(&self, buffer: &[u8]) -> Result<Vec<u8>, CallError>;
}

/// A callable specialized for one argument tuple and return type
pub(crate) struct BoundCall<F, Args, R> {
    target: TargetId,
    func: F,
    codec: Codec,
    stats: Arc<CallStats>,
    _signature: PhantomData<fn(Args) -> R>,
}

impl<F, Args, R> BoundCall<F, Args, R> {
    pub(crate) fn new(target: TargetId, func: F, codec: Codec, stats: Arc<CallStats>) -> Self {
        Self {
            target,
            func,
            codec,
            stats,
            _signature: PhantomData,
        }
    }
}

impl<F, Args, R> InvokeFromBuffer for BoundCall<F, Args, R>
where
    F: Callable<Args, Output = R>,
    Args: ArgList,
    R: Serialize + 'static,
{
    fn target(&self) -> TargetId {
        self.target
    }

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of::<Args>()
    }

    fn invoke(&self, buffer: &[u8]) -> Result<Vec<u8>, CallError> {
        let envelope = self.codec.decode::<Args>(buffer).map_err(|err| {
            match err {
                DecodeError::SignatureMismatch { .. } => self.stats.record_signature_mismatch(),
                _ => self.stats.record_decode_failure(),
            }
            err
        })?;

        if envelope.target() != self.target {
            self.stats.record_decode_failure();
            return Err(CallError::TargetMismatch {
                expected: self.target,
                found: envelope.target(),
            });
        }

        let output = self.func.call_with(envelope.into_arguments());
        self.stats.record_invoked();

        Ok(self.codec.encode_output(&output)?)
    }
}

/// Uniform re-entry point for a deferred call
///
/// Cheap to clone. The same trampoline may be called any number of times;
/// each call runs the target again.
#[derive(Clone)]
pub struct Trampoline {
    inner: Arc<dyn InvokeFromBuffer>,
    codec: Codec,
}

impl Trampoline {
    pub fn new(inner: Arc<dyn InvokeFromBuffer>, codec: Codec) -> Self {
        Self { inner, codec }
    }

    pub fn target(&self) -> TargetId {
        self.inner.target()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.inner.fingerprint()
    }

    /// Run the call encoded in `buffer`, returning the encoded result
    pub fn call(&self, buffer: &[u8]) -> Result<Vec<u8>, CallError> {
        debug!(target_id = %self.target(), bytes = buffer.len(), "Invoking trampoline");
        self.inner.invoke(buffer)
    }

    /// Run the call and decode its result as `R`
    ///
    /// `R` is not checked against the bound function's return type; prefer
    /// `Prepared::call`, which takes it from the handle.
    pub fn call_returning<R: DeserializeOwned>(&self, buffer: &[u8]) -> Result<R, CallError> {
        let output = self.call(buffer)?;
        Ok(self.codec.decode_output(&output)?)
    }
}

impl fmt::Debug for Trampoline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trampoline")
            .field("target", &self.target())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CallEnvelope;

    fn bound<F, Args, R>(name: &str, func: F) -> Trampoline
    where
        F: Callable<Args, Output = R>,
        Args: ArgList,
        R: Serialize + 'static,
    {
        bound_with_stats(name, func, Arc::new(CallStats::new()))
    }

    fn bound_with_stats<F, Args, R>(name: &str, func: F, stats: Arc<CallStats>) -> Trampoline
    where
        F: Callable<Args, Output = R>,
        Args: ArgList,
        R: Serialize + 'static,
    {
        let codec = Codec::new();
        let call = BoundCall::<F, Args, R>::new(TargetId::from_name(name), func, codec, stats);
        Trampoline::new(Arc::new(call), codec)
    }

    fn sum(a: u32, b: u32, c: u32) -> u32 {
        a + b + c
    }

    #[test]
    fn test_call_returning() {
        let trampoline = bound("sum", sum);
        let bytes = Codec::new()
            .encode(&CallEnvelope::new(TargetId::from_name("sum"), (1u32, 2u32, 3u32)))
            .unwrap();

        assert_eq!(trampoline.call_returning::<u32>(&bytes).unwrap(), 6);
    }

    #[test]
    fn test_target_mismatch() {
        let stats = Arc::new(CallStats::new());
        let trampoline = bound_with_stats("sum", sum, stats.clone());
        let bytes = Codec::new()
            .encode(&CallEnvelope::new(TargetId::from_name("other"), (1u32, 2u32, 3u32)))
            .unwrap();

        assert!(matches!(trampoline.call(&bytes), Err(CallError::TargetMismatch { .. })));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.invoked, 0);
    }

    #[test]
    fn test_wrong_arguments_are_rejected() {
        let trampoline = bound("sum", sum);
        let bytes = Codec::new()
            .encode(&CallEnvelope::new(TargetId::from_name("sum"), (1u64, 2u64)))
            .unwrap();

        assert!(matches!(
            trampoline.call(&bytes),
            Err(CallError::Decode(DecodeError::SignatureMismatch { .. }))
        ));
    }
}
