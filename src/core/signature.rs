//! Call shapes: argument tuples, callables and their fingerprints
//!
//! Rust has no variadic generics, so a parameter pack is modelled as a tuple
//! `(A1, ..., An)`. The `impl_call_shapes!` macro generates the `ArgList` and
//! `Callable` impls for every arity up to twelve.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash bytes with blake3 and keep the first 8 bytes as a little-endian u64
pub(crate) fn hash64(bytes: &[u8]) -> u64 {
    let hash = blake3::hash(bytes);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// Identifier of a registered function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Derive the id from a stable registration name
    pub fn from_name(name: &str) -> Self {
        Self(hash64(name.as_bytes()))
    }

    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// 64-bit digest of a Rust type signature
///
/// Computed from `std::any::type_name`, which is only guaranteed stable within
/// one build of a binary. That is the same lifetime as a registry, so a
/// fingerprint never has to outlive the process that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Fingerprint of an argument tuple
    pub fn of<T: ?Sized>() -> Self {
        Self(hash64(std::any::type_name::<T>().as_bytes()))
    }

    /// Fingerprint of a full call signature: arguments and return type
    pub fn of_signature<Args, R>() -> Self {
        Self::of::<fn(Args) -> R>()
    }

    pub const fn from_u64(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A tuple of call arguments that can cross the codec boundary
pub trait ArgList: Serialize + DeserializeOwned + Send + 'static {
    /// Number of positional arguments
    const ARITY: usize;
}

/// Something that can be called with an argument tuple splatted positionally
///
/// Implemented for every `Fn(A1, ..., An) -> R` up to twelve parameters, so
/// plain `fn` items and closures with annotated parameters qualify.
pub trait Callable<Args>: Send + Sync + 'static {
    type Output;

    fn call_with(&self, args: Args) -> Self::Output;
}

macro_rules! impl_call_shapes {
    ($($arg:ident),*) => {
        impl<$($arg,)*> ArgList for ($($arg,)*)
        where
            $($arg: Serialize + DeserializeOwned + Send + 'static,)*
        {
            const ARITY: usize = {
                let names: &[&str] = &[$(stringify!($arg)),*];
                names.len()
            };
        }

        impl<Func, Ret, $($arg,)*> Callable<($($arg,)*)> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
        {
            type Output = Ret;

            #[allow(non_snake_case)]
            #[inline]
            fn call_with(&self, ($($arg,)*): ($($arg,)*)) -> Ret {
                (self)($($arg),*)
            }
        }
    };
}

impl_call_shapes!();
impl_call_shapes!(A1);
impl_call_shapes!(A1, A2);
impl_call_shapes!(A1, A2, A3);
impl_call_shapes!(A1, A2, A3, A4);
impl_call_shapes!(A1, A2, A3, A4, A5);
impl_call_shapes!(A1, A2, A3, A4, A5, A6);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7, A8);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7, A8, A9);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11);
impl_call_shapes!(A1, A2, A3, A4, A5, A6, A7, A8, A9, A10, A11, A12);
