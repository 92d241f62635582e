pub mod log_level;

pub use log_level::{LogFormat, LogLevel};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{SchedulerError, SchedulerResult};

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先于传入的级别。重复初始化返回错误。
pub fn init_logging(level: LogLevel, format: LogFormat) -> SchedulerResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| SchedulerError::config_error(format!("初始化JSON日志格式失败: {e}"))),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .map_err(|e| SchedulerError::config_error(format!("初始化Pretty日志格式失败: {e}"))),
    }
}
