//! Deferred calls: capture a function call as bytes, run it later
//!
//! A function is registered under a stable name, a call to it is encoded
//! together with its arguments and written to a store, and a type-erased
//! trampoline later decodes the bytes and performs the call.
//!
//! ```
//! use std::sync::Arc;
//! use deferred_call::{FunctionRegistry, MemoryStore, Preparer, StoreKey};
//!
//! fn render(x: i32, y: i32) -> String {
//!     format!("x = {}, y = {}", x, y)
//! }
//!
//! let registry = Arc::new(FunctionRegistry::new());
//! let store = Arc::new(MemoryStore::new());
//! let preparer = Preparer::new(registry.clone(), store);
//!
//! let handle = registry.register("render", render).unwrap();
//! let prepared = preparer.prepare(&handle, StoreKey::unique(), (1, 2)).unwrap();
//!
//! let bytes = preparer.store().read(prepared.key()).unwrap();
//! let text = prepared.call(&bytes).unwrap();
//! assert_eq!(text, "x = 1, y = 2");
//! ```

pub mod codec;
pub mod core;
pub mod errors;
pub mod frontend;
pub mod infrastructure;
pub mod invoke;
pub mod store;

pub use crate::core::{ArgList, CallEnvelope, Callable, Fingerprint, TargetId};
pub use codec::{Codec, Header};
pub use errors::{CallError, ConfigError, DecodeError, EncodeError, RegistryError, StoreError};
pub use frontend::Config;
pub use infrastructure::{
    init_dev_logging, init_logging, init_prod_logging, CallStats, LogConfig, LogFormat, LogOutput,
    StatsSnapshot,
};
pub use invoke::{
    Completed, DeferredQueue, Executor, FnHandle, FunctionRegistry, InvokeFromBuffer, Prepared,
    Preparer, Trampoline,
};
pub use store::{FileStore, MemoryStore, Store, StoreKey};
