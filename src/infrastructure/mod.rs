//! Ambient infrastructure: logging setup and call counters

pub mod logging;
pub mod metrics;

pub use logging::{init_dev_logging, init_logging, init_prod_logging, LogConfig, LogFormat, LogOutput};
pub use metrics::{CallStats, StatsSnapshot};
