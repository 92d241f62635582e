use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sections::{DispatcherConfig, ObservabilityConfig, StaticWorkerConfig, StoreConfig};

/// 调度器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub workers: Vec<StaticWorkerConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// * `config_path` - 配置文件路径, 为 None 时依次尝试默认路径
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default(
                "dispatcher.poll_interval_ms",
                defaults.dispatcher.poll_interval_ms,
            )?
            .set_default(
                "dispatcher.schedule_timeout_seconds",
                defaults.dispatcher.schedule_timeout_seconds,
            )?
            .set_default(
                "dispatcher.selection_strategy",
                defaults.dispatcher.selection_strategy,
            )?
            .set_default("store.definitions_path", defaults.store.definitions_path)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default("observability.log_format", defaults.observability.log_format)?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            debug!("加载配置文件: {}", path);
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else {
            let default_paths = ["config/scheduler.toml", "scheduler.toml"];
            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                debug!("加载默认配置文件: {}", path);
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("DAGSCHED")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate().context("调度器配置验证失败")?;
        self.store.validate().context("存储配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        let mut seen = HashSet::new();
        for worker in &self.workers {
            worker.validate().context("Worker配置验证失败")?;
            if !seen.insert(worker.id.as_str()) {
                return Err(anyhow::anyhow!("Worker ID重复: {}", worker.id));
            }
        }

        Ok(())
    }
}
