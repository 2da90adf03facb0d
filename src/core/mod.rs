//! Core call model
//!
//! - `signature.rs` - argument tuples, callables, target ids and fingerprints
//! - `envelope.rs` - the captured call handed to the codec

pub mod envelope;
pub mod signature;

pub use envelope::CallEnvelope;
pub use signature::{ArgList, Callable, Fingerprint, TargetId};
