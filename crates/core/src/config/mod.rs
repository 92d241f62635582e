//! 配置管理
//!
//! 加载顺序: 默认值 → TOML 配置文件 → `DAGSCHED_` 前缀的环境变量
//! (层级分隔符 `__`, 例如 `DAGSCHED_DISPATCHER__POLL_INTERVAL_MS=500`)。

pub mod app_config;
pub mod sections;

pub use app_config::AppConfig;
pub use sections::{DispatcherConfig, ObservabilityConfig, StaticWorkerConfig, StoreConfig};
