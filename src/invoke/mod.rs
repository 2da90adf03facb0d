//! Deferred invocation
//!
//! Architecture:
//! - `registry.rs` - stable names to type-erased trampolines
//! - `trampoline.rs` - the uniform bytes-in, bytes-out call shape
//! - `preparer.rs` - capture, encode and store a call
//! - `executor.rs` - run stored calls by key, singly or in parallel
//! - `queue.rs` - worker threads draining submitted keys

mod executor;
mod preparer;
mod queue;
mod registry;
mod trampoline;

pub use executor::Executor;
pub use preparer::{Prepared, Preparer};
pub use queue::{Completed, DeferredQueue};
pub use registry::{FnHandle, FunctionRegistry};
pub use trampoline::{InvokeFromBuffer, Trampoline};
