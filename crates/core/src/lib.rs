//! # dagsched-core
//!
//! DAG 周期调度引擎的公共基础: 错误类型、数据模型、协作方接口、配置与日志。

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::{SchedulerError, SchedulerResult};
pub use logging::{init_logging, LogFormat, LogLevel};
